use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for layer and group IDs: fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Spur);

        impl $name {
            /// Intern a new string as an ID, or return the existing one.
            pub fn intern(s: &str) -> Self {
                $name(INTERNER.get_or_intern(s))
            }

            /// Resolve back to a string slice.
            pub fn as_str(&self) -> &str {
                INTERNER.resolve(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::intern(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::intern(&s))
            }
        }
    };
}

interned_id! {
    /// Stable identifier of a layer, unique within one document.
    /// Internally a `Spur` index (4 bytes, Copy, Eq, Hash in O(1)).
    LayerId
}

interned_id! {
    /// Identifier of a layer group bucket (`brief`, `canvas`, `moodboard`, or custom).
    GroupId
}

impl LayerId {
    /// Generate a unique ID for a layer created without one.
    pub fn generate() -> Self {
        Self::with_prefix("layer")
    }

    /// Generate a unique ID with a prefix (e.g. `layer_1`, `rect_2`).
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            // Skip names a host already interned, e.g. a hydrated `layer_0`.
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = LayerId::intern("hero_image");
        let b = LayerId::intern("hero_image");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hero_image");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = LayerId::generate();
        let b = LayerId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_skip_taken_names() {
        let taken = LayerId::intern("shape_0");
        let fresh = LayerId::with_prefix("shape");
        assert_ne!(fresh, taken);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = GroupId::intern("canvas");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"canvas\"");
        let back: GroupId = serde_json::from_str("\"canvas\"").unwrap();
        assert_eq!(back, id);
    }
}
