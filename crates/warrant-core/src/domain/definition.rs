//! Job definition: identity and authorization metadata of a job type.

use std::collections::BTreeSet;

use serde::Serialize;

use super::errors::DefinitionError;
use super::role::Role;

/// Immutable identity and authorization metadata for a schedulable unit of work.
///
/// Roles are populated through the consuming `with_*` methods while the job type
/// is being registered. Once the definition is handed to an executor there is no
/// way to change it.
///
/// An empty role set authorizes nobody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDefinition {
    name: String,
    allowed_roles: BTreeSet<Role>,
    allow_concurrent_execution: bool,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>) -> Result<Self, DefinitionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        Ok(Self {
            name,
            allowed_roles: BTreeSet::new(),
            allow_concurrent_execution: false,
        })
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.allowed_roles.insert(role.into());
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        self.allowed_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Whether the scheduler may fire this job while a previous run is still in flight.
    pub fn allow_concurrent_execution(mut self, allow: bool) -> Self {
        self.allow_concurrent_execution = allow;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_roles(&self) -> &BTreeSet<Role> {
        &self.allowed_roles
    }

    pub fn allows_concurrent_execution(&self) -> bool {
        self.allow_concurrent_execution
    }

    pub fn is_authorized(&self, role: &Role) -> bool {
        self.allowed_roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn new_definition_is_fail_closed() {
        let def = JobDefinition::new("SendReport").unwrap();
        assert!(def.allowed_roles().is_empty());
        assert!(!def.is_authorized(&Role::new("Admin")));
        assert!(!def.is_authorized(&Role::new("")));
    }

    #[rstest]
    #[case::empty("")]
    #[case::spaces("   ")]
    #[case::tab("\t")]
    fn blank_name_is_rejected(#[case] name: &str) {
        let err = JobDefinition::new(name).unwrap_err();
        assert!(matches!(err, DefinitionError::EmptyName));
    }

    #[rstest]
    #[case::listed("Admin", true)]
    #[case::other_listed("Operator", true)]
    #[case::unlisted("Guest", false)]
    #[case::case_differs("admin", false)]
    fn is_authorized_checks_membership(#[case] role: &str, #[case] expected: bool) {
        let def = JobDefinition::new("SendReport")
            .unwrap()
            .with_roles(["Admin", "Operator"]);

        assert_eq!(def.is_authorized(&Role::new(role)), expected);
    }

    #[test]
    fn concurrent_execution_defaults_to_false() {
        let def = JobDefinition::new("SendReport").unwrap();
        assert!(!def.allows_concurrent_execution());

        let def = def.allow_concurrent_execution(true);
        assert!(def.allows_concurrent_execution());
    }

    #[test]
    fn with_role_deduplicates() {
        let def = JobDefinition::new("SendReport")
            .unwrap()
            .with_role("Admin")
            .with_role("Admin");
        assert_eq!(def.allowed_roles().len(), 1);
        assert_eq!(def.name(), "SendReport");
    }
}
