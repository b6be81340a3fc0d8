/// The verb the store actually performed.
///
/// Not always the verb that was requested: an unconditional `set` on an
/// absent key is reported as [`Action::Create`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Action {
    /// Error replies and synthesized listings carry no store verb
    #[default]
    Unspecified,
    Get,
    Set,
    Create,
    Update,
    Delete,
    CompareAndSwap,
    CompareAndDelete,
    Expire,
    LeaseGrant,
    Other(String),
}

impl Action {
    pub fn parse(verb: &str) -> Self {
        match verb {
            "" => Action::Unspecified,
            "get" => Action::Get,
            "set" => Action::Set,
            "create" => Action::Create,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "compareAndSwap" => Action::CompareAndSwap,
            "compareAndDelete" => Action::CompareAndDelete,
            "expire" => Action::Expire,
            "leasegrant" => Action::LeaseGrant,
            other => Action::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Unspecified => "",
            Action::Get => "get",
            Action::Set => "set",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::CompareAndSwap => "compareAndSwap",
            Action::CompareAndDelete => "compareAndDelete",
            Action::Expire => "expire",
            Action::LeaseGrant => "leasegrant",
            Action::Other(verb) => verb,
        }
    }
}

impl From<&str> for Action {
    fn from(verb: &str) -> Self {
        Action::parse(verb)
    }
}

impl PartialEq<str> for Action {
    fn eq(
        &self,
        other: &str,
    ) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Action {
    fn eq(
        &self,
        other: &&str,
    ) -> bool {
        self.as_str() == *other
    }
}

impl std::fmt::Display for Action {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
