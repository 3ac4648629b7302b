use std::fmt;
use std::str::FromStr;

/// Permission carried by an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Create and drive escrows, proofs, mandates and spends
    Sender,
    /// Review proofs
    Support,
    /// Everything, including user and key management
    Admin,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Sender => "sender",
            Scope::Support => "support",
            Scope::Admin => "admin",
        }
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(self, required: Scope) -> bool {
        self == Scope::Admin || self == required
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender" => Ok(Scope::Sender),
            "support" => Ok(Scope::Support),
            "admin" => Ok(Scope::Admin),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_implies_everything() {
        assert!(Scope::Admin.grants(Scope::Sender));
        assert!(Scope::Admin.grants(Scope::Support));
        assert!(Scope::Admin.grants(Scope::Admin));
    }

    #[test]
    fn test_non_admin_scopes_are_disjoint() {
        assert!(!Scope::Sender.grants(Scope::Support));
        assert!(!Scope::Support.grants(Scope::Sender));
        assert!(!Scope::Support.grants(Scope::Admin));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Admin".parse::<Scope>().unwrap(), Scope::Admin);
        assert!("root".parse::<Scope>().is_err());
    }
}
