use {serde::Deserialize, serde::Serialize, std::fmt, std::str::FromStr};

/// A string did not name a known enum variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {what}: {value}")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

/// Dashboard agent role.
///
/// Super admins see every bot; regular admins only see bots they have an
/// assignment for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    SuperAdmin,
    Admin,
}

impl AgentRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            other => Err(ParseEnumError {
                what: "agent role",
                value: other.to_string(),
            }),
        }
    }
}

/// Who authored a persisted conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    EndUser,
    Agent,
}

impl MessageSender {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndUser => "end_user",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageSender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "end_user" => Ok(Self::EndUser),
            "agent" => Ok(Self::Agent),
            other => Err(ParseEnumError {
                what: "message sender",
                value: other.to_string(),
            }),
        }
    }
}
