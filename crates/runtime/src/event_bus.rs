use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Informational alert handed to the alerting module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub category: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Shown once per session, then suppressed.
    pub one_time_message: bool,
}

impl Alert {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            category: "info".to_string(),
            content: content.into(),
            title: None,
            one_time_message: false,
        }
    }

    pub fn once(mut self) -> Self {
        self.one_time_message = true;
        self
    }
}

/// Requests the layer core makes to modules it does not own.
///
/// Payloads that carry layer configurations are passed as JSON so this crate
/// stays independent of the configuration model.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddSingleAlert(Alert),
    NavigateForward {
        last_folder_names: Vec<String>,
        sub_elements: Vec<Value>,
    },
    ResetLayerSelection,
}

impl Action {
    /// Namespaced action name as known to the receiving module.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddSingleAlert(_) => "Alerting/addSingleAlert",
            Action::NavigateForward { .. } => "Modules/LayerSelection/navigateForward",
            Action::ResetLayerSelection => "Modules/LayerSelection/reset",
        }
    }
}

/// A dispatched action with its position in the dispatch sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub sequence: u64,
    pub action: Action,
}

/// Ordered record of everything dispatched to external modules.
#[derive(Debug, Default)]
pub struct ActionBus {
    next_sequence: u64,
    dispatched: Vec<Dispatched>,
}

impl ActionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!("dispatch {}", action.name());
        self.dispatched.push(Dispatched {
            sequence: self.next_sequence,
            action,
        });
        self.next_sequence += 1;
    }

    pub fn dispatched(&self) -> &[Dispatched] {
        &self.dispatched
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.dispatched.iter().map(|d| &d.action)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.actions().filter_map(|a| match a {
            Action::AddSingleAlert(alert) => Some(alert),
            _ => None,
        })
    }

    pub fn drain(&mut self) -> Vec<Dispatched> {
        std::mem::take(&mut self.dispatched)
    }
}
