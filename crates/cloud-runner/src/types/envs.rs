use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EnvironmentVariable {
  pub name: String,
  pub value: String,
}

impl EnvironmentVariable {
  pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
    }
  }
}

impl From<(&str, &str)> for EnvironmentVariable {
  fn from((name, value): (&str, &str)) -> Self {
    Self::new(name, value)
  }
}

impl From<(&str, String)> for EnvironmentVariable {
  fn from((name, value): (&str, String)) -> Self {
    Self::new(name, value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from() {
    assert_eq!(
      EnvironmentVariable::from(("BUILDID", "test")),
      EnvironmentVariable::new("BUILDID", "test")
    );
    assert_eq!(
      EnvironmentVariable::from(("BUILDID", "test".to_string())),
      EnvironmentVariable::new("BUILDID", "test")
    );
  }
}
