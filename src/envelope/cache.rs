use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::params::{StaticAircraftParams, Tuning};
use crate::utils::DynamicsError;

/// Bumped whenever the derivation semantics or the cached layout change.
const SCHEMA_VERSION: u32 = 1;

/// Everything the derivation depends on. Serialized next to each cached
/// blob; any byte-level difference invalidates the blob.
#[derive(Debug, Clone, Serialize)]
pub struct CacheKey<'a> {
    schema_version: u32,
    params: &'a StaticAircraftParams,
    tuning: &'a Tuning,
}

impl<'a> CacheKey<'a> {
    pub fn new(params: &'a StaticAircraftParams, tuning: &'a Tuning) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            params,
            tuning,
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>, DynamicsError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Disk cache for derived data, one directory per aircraft type. Each
/// entry is a JSON blob with a sidecar key file; a stale or unreadable
/// entry is recomputed and rewritten, never an error.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(root: &Path, aircraft: &str) -> Self {
        Self {
            dir: root.join(aircraft),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.key", name))
    }

    fn try_load<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Option<T> {
        let stored_key = fs::read(self.key_path(name)).ok()?;
        if stored_key != key {
            warn!(name, "cached {} does not match current parameters", name);
            return None;
        }
        let data = match fs::read(self.data_path(name)) {
            Ok(d) => d,
            Err(err) => {
                warn!(name, %err, "cached {} unreadable", name);
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(name, %err, "cached {} undecodable", name);
                None
            }
        }
    }

    /// Returns the cached value for `name` when its key matches, otherwise
    /// computes, stores and returns a fresh one.
    pub fn load_or_compute<T, F>(
        &self,
        name: &str,
        key: &CacheKey,
        compute: F,
    ) -> Result<T, DynamicsError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DynamicsError>,
    {
        let key_bytes = key.to_bytes()?;
        if let Some(value) = self.try_load(name, &key_bytes) {
            debug!(name, "loaded {} from cache", name);
            return Ok(value);
        }
        let value = compute()?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.data_path(name), serde_json::to_vec(&value)?)?;
        fs::write(self.key_path(name), &key_bytes)?;
        debug!(name, "computed and cached {}", name);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn params() -> StaticAircraftParams {
        StaticAircraftParams::from_yaml_str(crate::params::tests::TEST_YAML).unwrap()
    }

    #[test]
    fn test_round_trip_computes_once() {
        let dir = tempfile::tempdir().unwrap();
        let p = params();
        let t = Tuning::default();
        let key = CacheKey::new(&p, &t);
        let store = CacheStore::new(dir.path(), &p.name);

        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec![1.0_f64, 2.0, 3.0])
        };
        let a: Vec<f64> = store.load_or_compute("basedat", &key, compute).unwrap();
        assert_eq!(calls.get(), 1);

        let b: Vec<f64> = store
            .load_or_compute("basedat", &key, || {
                calls.set(calls.get() + 1);
                Ok(vec![9.0])
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_change_recomputes() {
        let dir = tempfile::tempdir().unwrap();
        let p = params();
        let t = Tuning::default();
        let store = CacheStore::new(dir.path(), &p.name);

        let key = CacheKey::new(&p, &t);
        let a: Vec<f64> = store
            .load_or_compute("basedat", &key, || Ok(vec![1.0]))
            .unwrap();
        assert_eq!(a, vec![1.0]);

        // Any parameter change flips the key.
        let mut p2 = p.clone();
        p2.thrust_mil += 1.0;
        let key2 = CacheKey::new(&p2, &t);
        let b: Vec<f64> = store
            .load_or_compute("basedat", &key2, || Ok(vec![2.0]))
            .unwrap();
        assert_eq!(b, vec![2.0]);

        // And so does a tuning change.
        let t3 = Tuning {
            sfc_ab_alt_factor: 0.6,
        };
        let key3 = CacheKey::new(&p, &t3);
        let c: Vec<f64> = store
            .load_or_compute("basedat", &key3, || Ok(vec![3.0]))
            .unwrap();
        assert_eq!(c, vec![3.0]);
    }

    #[test]
    fn test_corrupt_blob_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let p = params();
        let t = Tuning::default();
        let key = CacheKey::new(&p, &t);
        let store = CacheStore::new(dir.path(), &p.name);

        let _: Vec<f64> = store
            .load_or_compute("basedat", &key, || Ok(vec![1.0]))
            .unwrap();
        std::fs::write(store.data_path("basedat"), b"not json").unwrap();
        let b: Vec<f64> = store
            .load_or_compute("basedat", &key, || Ok(vec![4.0]))
            .unwrap();
        assert_eq!(b, vec![4.0]);
    }
}
