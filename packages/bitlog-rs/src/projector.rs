// Window projector: bounded live view over the session
//
// The projection is recomputed from scratch on every change and is never
// stored. It only covers the most recent records and only enabled sensors.

use crate::schema::SchemaRegistry;
use crate::session::SessionStore;
use serde::{Deserialize, Serialize};

/// Number of records shown in the live view by default.
pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Series colors, assigned by rank in the sorted enabled-key list.
pub const COLOR_PALETTE: [&str; 7] = [
    "#2563eb", "#f97316", "#22c55e", "#e11d48", "#a855f7", "#0ea5e9", "#facc15",
];

/// Color for the `rank`-th enabled series.
///
/// Purely positional: a sensor's color shifts when sensors before it are
/// discovered, enabled or disabled.
pub fn color_for_rank(rank: usize) -> &'static str {
    COLOR_PALETTE[rank % COLOR_PALETTE.len()]
}

/// One chart series, aligned with [`Projection::labels`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub key: String,
    pub label: String,
    pub color: String,
    /// `None` where the record has no value for this key
    pub values: Vec<Option<f64>>,
}

/// Full replacement payload for the visualization sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Display-formatted timestamp per windowed record
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn series(&self, key: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.key == key)
    }
}

#[derive(Debug, Clone)]
pub struct WindowProjector {
    capacity: usize,
    time_format: String,
}

impl WindowProjector {
    pub fn new(capacity: usize, time_format: impl Into<String>) -> Self {
        Self {
            capacity,
            time_format: time_format.into(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Project the last `capacity` records onto the enabled sensors.
    pub fn project(&self, session: &SessionStore, registry: &SchemaRegistry) -> Projection {
        let window = session.tail(self.capacity);

        let labels = window
            .iter()
            .map(|r| r.timestamp().format(&self.time_format).to_string())
            .collect();

        let series = registry
            .enabled()
            .enumerate()
            .map(|(rank, sensor)| Series {
                key: sensor.key().to_string(),
                label: sensor.label().to_string(),
                color: color_for_rank(rank).to_string(),
                values: window.iter().map(|r| r.value(sensor.key())).collect(),
            })
            .collect();

        Projection { labels, series }
    }
}

impl Default for WindowProjector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, "%H:%M:%S")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use crate::session::Record;
    use chrono::{Duration, Local, TimeZone};

    fn fill(lines: &[&str]) -> (SessionStore, SchemaRegistry) {
        let start = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut session = SessionStore::new();
        let mut registry = SchemaRegistry::new();
        for (i, line) in lines.iter().enumerate() {
            let fields = parse_line(line);
            registry.observe(fields.keys());
            session.append(Record::new(start + Duration::seconds(i as i64), fields));
        }
        (session, registry)
    }

    #[test]
    fn test_projection_aligns_series_with_labels() {
        let (session, registry) = fill(&["A=1;B=2", "B=3", "A=4"]);
        let projection = WindowProjector::new(10, "%H:%M:%S").project(&session, &registry);

        assert_eq!(projection.labels, vec!["09:00:00", "09:00:01", "09:00:02"]);
        assert_eq!(projection.series.len(), 2);
        assert_eq!(projection.series("A").unwrap().values, vec![Some(1.0), None, Some(4.0)]);
        assert_eq!(projection.series("B").unwrap().values, vec![Some(2.0), Some(3.0), None]);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let lines: Vec<String> = (0..25).map(|i| format!("N={}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (session, registry) = fill(&refs);

        let projection = WindowProjector::new(10, "%S").project(&session, &registry);
        assert_eq!(projection.len(), 10);
        let values = &projection.series("N").unwrap().values;
        assert_eq!(values.first(), Some(&Some(15.0)));
        assert_eq!(values.last(), Some(&Some(24.0)));
    }

    #[test]
    fn test_disabled_sensor_excluded() {
        let (session, mut registry) = fill(&["A=1;B=2;C=3"]);
        registry.set_enabled("B", false).unwrap();

        let projection = WindowProjector::default().project(&session, &registry);
        let keys: Vec<_> = projection.series.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "C"]);
    }

    #[test]
    fn test_colors_follow_enabled_rank() {
        let (session, mut registry) = fill(&["A=1;B=2;C=3"]);
        let projector = WindowProjector::default();

        let before = projector.project(&session, &registry);
        assert_eq!(before.series("C").unwrap().color, COLOR_PALETTE[2]);

        registry.set_enabled("A", false).unwrap();
        let after = projector.project(&session, &registry);
        assert_eq!(after.series("B").unwrap().color, COLOR_PALETTE[0]);
        assert_eq!(after.series("C").unwrap().color, COLOR_PALETTE[1]);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(color_for_rank(0), color_for_rank(COLOR_PALETTE.len()));
    }

    #[test]
    fn test_empty_session() {
        let (_, registry) = fill(&["A=1"]);
        let projection = WindowProjector::default().project(&SessionStore::new(), &registry);
        assert!(projection.is_empty());
        assert!(projection.series.iter().all(|s| s.values.is_empty()));
    }
}
