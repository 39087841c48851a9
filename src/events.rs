use serde::{Deserialize, Serialize};

/// Timeline events the engine emits while a run is in flight.
///
/// `at_ms` is measured from engine start; `scroll_count` is the number of
/// completed scroll attempts when the event fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrollEvent {
    HeightChange {
        scroll_count: u32,
        at_ms: u64,
        previous: i64,
        current: i64,
    },
    ButtonClick {
        scroll_count: u32,
        at_ms: u64,
        selector: String,
    },
    ScrollBatch {
        scroll_count: u32,
        at_ms: u64,
        position: i64,
        height: i64,
    },
}

/// Consumer of engine timeline events, subscribed once at engine construction.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &ScrollEvent);
}

/// Default sink: discard everything.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_event(&self, _event: &ScrollEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_screaming_kind_tags() {
        let ev = ScrollEvent::HeightChange {
            scroll_count: 3,
            at_ms: 1200,
            previous: 2000,
            current: 2600,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "HEIGHT_CHANGE");
        assert_eq!(json["scroll_count"], 3);

        let ev = ScrollEvent::ButtonClick {
            scroll_count: 1,
            at_ms: 40,
            selector: ".load-more".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "BUTTON_CLICK");
    }
}
