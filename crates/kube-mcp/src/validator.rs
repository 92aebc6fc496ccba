//! Command validation.
//!
//! Validation is mechanical: a command is eligible when it tokenizes the
//! way the executor will split it and its first token is the kubectl binary
//! name. Destructive verbs are recognized so a policy can
//! hook in, but they are passed through unchanged.

use tracing::debug;

use crate::executor::split_command;

/// Name every generic command must start with.
pub const KUBECTL: &str = "kubectl";

/// Verbs classified as destructive by default.
pub const DEFAULT_DESTRUCTIVE_VERBS: &[&str] = &["delete", "drain", "cordon"];

/// Outcome of validating one command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the command may run.
    pub accepted: bool,
    /// Why it was rejected.
    pub reason: Option<String>,
}

impl ValidationOutcome {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Checks command strings before anything is spawned.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    binary: String,
    destructive_verbs: Vec<String>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new(KUBECTL, DEFAULT_DESTRUCTIVE_VERBS.iter().copied())
    }
}

impl CommandValidator {
    /// Create a validator for `binary` with the given destructive verbs.
    pub fn new<I, S>(binary: impl Into<String>, destructive_verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            binary: binary.into(),
            destructive_verbs: destructive_verbs
                .into_iter()
                .map(|v| v.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Decide whether `command` is well-formed and eligible for execution.
    pub fn validate(&self, command: &str) -> ValidationOutcome {
        match self.tokenize(command) {
            Ok(_) => ValidationOutcome::accept(),
            Err(reason) => ValidationOutcome::reject(reason),
        }
    }

    /// Split `command` into the exact arguments that will run, checking it
    /// on the way.
    ///
    /// The tokens are the ones the executor receives, so the first-token
    /// check sees what kubectl would see.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for unbalanced quoting or a first token
    /// other than the binary name.
    pub fn tokenize(&self, command: &str) -> Result<Vec<String>, String> {
        let tokens = split_command(command)
            .ok_or_else(|| "Command has unbalanced quotes or a trailing escape".to_string())?;
        if tokens.first().map(String::as_str) != Some(self.binary.as_str()) {
            return Err(format!("Command must start with '{}'", self.binary));
        }

        // Classification only: destructive commands are not blocked.
        if let Some(verb) = self.destructive_verb(command) {
            debug!(verb, "destructive operation passed through");
        }

        Ok(tokens)
    }

    /// The first destructive verb appearing as a whole token, case-insensitively.
    pub fn destructive_verb(&self, command: &str) -> Option<&str> {
        command.split_whitespace().find_map(|token| {
            let token = token.to_lowercase();
            self.destructive_verbs
                .iter()
                .find(|verb| **verb == token)
                .map(String::as_str)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("kubectl get pods" ; "simple")]
    #[test_case("  kubectl   get pods -n kube-system" ; "leading whitespace")]
    #[test_case("kubectl" ; "bare binary")]
    #[test_case("kubectl delete pod nginx" ; "destructive delete")]
    #[test_case("kubectl drain worker-1 --ignore-daemonsets" ; "destructive drain")]
    #[test_case("kubectl cordon worker-1" ; "destructive cordon")]
    fn accepts(command: &str) {
        let outcome = CommandValidator::default().validate(command);
        assert!(outcome.accepted, "{command} rejected: {:?}", outcome.reason);
        assert_eq!(outcome.reason, None);
    }

    #[test_case("get pods" ; "missing prefix")]
    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("kubectlx get pods" ; "prefix is not the binary")]
    #[test_case("sh -c 'kubectl get pods'" ; "wrapped in shell")]
    #[test_case("Kubectl get pods" ; "case sensitive")]
    #[test_case("kubectl\u{a0}get pods -n prod" ; "non-breaking space after binary")]
    #[test_case("kubectl\u{2003}get pods" ; "em space after binary")]
    #[test_case("'kubectl get' pods" ; "quoted prefix")]
    fn rejects(command: &str) {
        let outcome = CommandValidator::default().validate(command);
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason.as_deref(), Some("Command must start with 'kubectl'"));
    }

    #[test]
    fn unbalanced_quoting_rejected() {
        let outcome = CommandValidator::default().validate("kubectl get pods -l 'app=x");
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("Command has unbalanced quotes or a trailing escape")
        );
    }

    #[test]
    fn tokens_match_what_runs() {
        let validator = CommandValidator::default();
        assert_eq!(
            validator.tokenize("  kubectl get pods -l 'app=my app'").unwrap(),
            ["kubectl", "get", "pods", "-l", "app=my app"]
        );
        // Unicode whitespace does not separate arguments, so the verb would be glued to the binary.
        assert_eq!(
            validator.tokenize("kubectl\u{a0}get pods").unwrap_err(),
            "Command must start with 'kubectl'"
        );
    }

    #[test]
    fn classifies_destructive_verbs() {
        let validator = CommandValidator::default();
        assert_eq!(validator.destructive_verb("kubectl DELETE pod x"), Some("delete"));
        assert_eq!(validator.destructive_verb("kubectl drain node-1"), Some("drain"));
        assert_eq!(validator.destructive_verb("kubectl get pods"), None);
        // Substrings are not verbs.
        assert_eq!(validator.destructive_verb("kubectl get pods -l app=deleter"), None);
    }

    #[test]
    fn custom_binary_and_verbs() {
        let validator = CommandValidator::new("oc", ["Scale"]);
        assert!(validator.validate("oc get pods").accepted);
        assert_eq!(
            validator.validate("kubectl get pods").reason.as_deref(),
            Some("Command must start with 'oc'")
        );
        assert_eq!(validator.destructive_verb("oc scale dc/x --replicas=0"), Some("scale"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_commands_without_prefix_rejected(first in "[a-zA-Z0-9_./-]{1,20}", rest in "[a-zA-Z0-9 =,./:_-]{0,60}") {
            prop_assume!(first != KUBECTL);
            let outcome = CommandValidator::default().validate(&format!("{first} {rest}"));
            prop_assert!(!outcome.accepted);
            prop_assert_eq!(outcome.reason.as_deref(), Some("Command must start with 'kubectl'"));
        }

        #[test]
        fn prop_prefixed_commands_accepted(
            verb in prop::sample::select(vec!["get", "describe", "delete", "drain", "cordon", "logs"]),
            rest in "[a-zA-Z0-9 =,./:_-]{0,60}",
        ) {
            let outcome = CommandValidator::default().validate(&format!("kubectl {verb} {rest}"));
            prop_assert!(outcome.accepted);
        }
    }
}
