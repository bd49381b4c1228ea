/// A secret handed to a build task.
///
/// `parameter_key` names the secret in the provider's template layer,
/// `environment_variable` is the name the task sees at runtime.
#[derive(Clone, PartialEq)]
pub struct Secret {
  pub parameter_key: String,
  pub environment_variable: String,
  pub parameter_value: String,
}

impl Secret {
  pub fn new(
    parameter_key: impl Into<String>,
    environment_variable: impl Into<String>,
    parameter_value: impl ToString,
  ) -> Self {
    Self {
      parameter_key: parameter_key.into(),
      environment_variable: environment_variable.into(),
      parameter_value: parameter_value.to_string(),
    }
  }

  /// A secret taken straight from a `name: value` pair, exposed under the
  /// same name it was declared with.
  pub fn from_env_pair(name: impl Into<String>, value: impl ToString) -> Self {
    let name = name.into();

    Self::new(name.clone(), name, value)
  }

  /// The parameter key reduced to the characters an infrastructure template
  /// identifier may contain.
  pub fn template_key(&self) -> String {
    self
      .parameter_key
      .chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.parameter_value.is_empty()
  }
}

// Secrets end up in diagnostic dumps on failure paths. Never print the value.
impl std::fmt::Debug for Secret {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Secret")
      .field("parameter_key", &self.parameter_key)
      .field("environment_variable", &self.environment_variable)
      .field("parameter_value", &"***")
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_template_key() {
    let secret = Secret::new("My-Key_1", "MY_KEY", "value");
    assert_eq!(secret.template_key(), "MyKey1");

    let secret = Secret::new("Tok3n!", "TOKEN", "abc");
    assert_eq!(secret.template_key(), "Tok3n");
  }

  #[test]
  fn test_numeric_value_is_coerced() {
    let secret = Secret::new("AndroidVersionCode", "ANDROID_VERSION_CODE", 42);
    assert_eq!(secret.parameter_value, "42");
  }

  #[test]
  fn test_is_empty() {
    assert!(Secret::new("Key", "KEY", "").is_empty());
    assert!(!Secret::new("Key", "KEY", "value").is_empty());
  }

  #[test]
  fn test_debug_redacts_value() {
    let secret = Secret::new("GithubToken", "GITHUB_TOKEN", "super-secret");
    let debug = format!("{:?}", secret);

    assert!(debug.contains("GithubToken"));
    assert!(debug.contains("***"));
    assert!(!debug.contains("super-secret"));
  }

  #[test]
  fn test_from_env_pair() {
    let secret = Secret::from_env_pair("AWS_ACCESS_KEY_ID", "AKIA123");

    assert_eq!(secret.parameter_key, "AWS_ACCESS_KEY_ID");
    assert_eq!(secret.environment_variable, "AWS_ACCESS_KEY_ID");
    assert_eq!(secret.parameter_value, "AKIA123");
  }
}
