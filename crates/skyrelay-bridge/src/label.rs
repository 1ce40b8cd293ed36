use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// Default number of remote users whose label is kept.
pub const DEFAULT_LABEL_CAPACITY: usize = 1024;

/// Deterministic mIRC foreground colour for `user_id`.
///
/// Black and white (0 and 1) are never picked so the label stays readable
/// on both light and dark clients.
pub fn canonical_color(user_id: &str) -> u8 {
    let digest = Sha256::digest(user_id.as_bytes());
    let h = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (h % 14 + 2) as u8
}

/// Renders `user_id` wrapped in its canonical colour.
pub fn colorize(user_id: &str) -> String {
    format!("\x03{:02}{user_id}\x03", canonical_color(user_id))
}

struct LabelCache {
    labels: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Bounded cache of coloured user labels, evicting the oldest entry first.
pub struct UserLabels {
    capacity: usize,
    cache: Mutex<LabelCache>,
}

impl UserLabels {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cache: Mutex::new(LabelCache {
                labels: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// The coloured label for `user_id`.
    pub fn label(&self, user_id: &str) -> String {
        let mut cache = self.cache.lock();
        if let Some(label) = cache.labels.get(user_id) {
            return label.clone();
        }

        let label = colorize(user_id);
        if cache.order.len() >= self.capacity {
            if let Some(oldest) = cache.order.pop_front() {
                cache.labels.remove(&oldest);
            }
        }
        cache.order.push_back(user_id.to_string());
        cache.labels.insert(user_id.to_string(), label.clone());
        label
    }

    /// Number of cached labels.
    pub fn len(&self) -> usize {
        self.cache.lock().labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserLabels {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_CAPACITY)
    }
}
