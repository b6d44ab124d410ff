use serde::{Deserialize, Serialize};

/// How far an action reaches outside the platform.
/// Ordered by increasing severity of side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Reads remote state only.
    Observe,
    /// Changes remote state in a way the remote service lets you undo.
    Mutate,
    /// Cannot be taken back once sent (a chat message, a page).
    Irreversible,
}

impl Effect {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Effect::Observe)
    }

    /// UI hint: views are `Observe`, everything else is an action.
    pub fn method_type(&self) -> &'static str {
        match self {
            Effect::Observe => "view",
            Effect::Mutate | Effect::Irreversible => "action",
        }
    }
}

/// Which entry point a method dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodEntry {
    Notify,
    Query,
}

/// An invokable action a provider exposes to workflows and the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderMethod {
    pub name: &'static str,
    pub entry: MethodEntry,
    pub description: &'static str,
    pub scopes: &'static [&'static str],
    pub effect: Effect,
}

impl ProviderMethod {
    pub fn method_type(&self) -> &'static str {
        self.effect.method_type()
    }
}
