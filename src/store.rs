use {
  super::*,
  rusty_leveldb::{DB, LdbIterator, WriteBatch},
};

enum Op {
  Delete { key: Vec<u8> },
  Put { key: Vec<u8>, value: Vec<u8> },
}

/// An ordered set of writes applied atomically. A block is connected to, or
/// disconnected from, an index with a single batch, so a crash can never
/// leave an index's records and its tip disagreeing.
#[derive(Default)]
pub struct Batch {
  ops: Vec<Op>,
}

impl Batch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
    self.ops.push(Op::Put { key, value });
  }

  pub fn delete(&mut self, key: Vec<u8>) {
    self.ops.push(Op::Delete { key });
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }
}

/// Contract the engine requires of the physical store: point reads, atomic
/// all-or-nothing batches, and forward scans over a half-open key range in
/// ascending key order.
pub trait Store {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

  fn write(&self, batch: Batch) -> Result;

  /// Visits entries with `lower <= key < upper`, stopping early when `visit`
  /// returns false.
  fn scan(
    &self,
    lower: &[u8],
    upper: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
  ) -> Result;
}

impl<T: Store> Store for Arc<T> {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    (**self).get(key)
  }

  fn write(&self, batch: Batch) -> Result {
    (**self).write(batch)
  }

  fn scan(
    &self,
    lower: &[u8],
    upper: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
  ) -> Result {
    (**self).scan(lower, upper, visit)
  }
}

pub struct LevelDb {
  db: Mutex<DB>,
}

impl LevelDb {
  pub fn open(path: &Path) -> Result<Self> {
    let mut options = rusty_leveldb::Options::default();
    options.create_if_missing = true;

    let db = DB::open(path, options)
      .map_err(|status| StoreSnafu { message: status.to_string() }.build())?;

    Ok(Self { db: Mutex::new(db) })
  }
}

impl Store for LevelDb {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.db.lock().unwrap().get(key))
  }

  fn write(&self, batch: Batch) -> Result {
    let mut writes = WriteBatch::default();

    for op in &batch.ops {
      match op {
        Op::Put { key, value } => writes.put(key, value),
        Op::Delete { key } => writes.delete(key),
      }
    }

    self
      .db
      .lock()
      .unwrap()
      .write(writes, true)
      .map_err(|status| StoreSnafu { message: status.to_string() }.build())
  }

  fn scan(
    &self,
    lower: &[u8],
    upper: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
  ) -> Result {
    if lower >= upper {
      return Ok(());
    }

    let mut db = self.db.lock().unwrap();

    let mut iterator = db
      .new_iter()
      .map_err(|status| StoreSnafu { message: status.to_string() }.build())?;

    // The iterator must be read before being advanced, or the entry seek
    // landed on is silently skipped.
    iterator.seek(lower);

    let mut key = Vec::new();
    let mut value = Vec::new();

    while iterator.valid() {
      if !iterator.current(&mut key, &mut value) {
        break;
      }

      if key.as_slice() >= upper {
        break;
      }

      if !visit(&key, &value) {
        break;
      }

      if !iterator.advance() {
        break;
      }
    }

    Ok(())
  }
}

/// BTreeMap-backed store for tests. Scans mirror LevelDB's byte-ordered
/// iteration exactly.
#[derive(Default)]
pub struct MemoryStore {
  map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Full copy of the current contents, for whole-state comparisons.
  pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
    self.map.lock().unwrap().clone()
  }
}

impl Store for MemoryStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.map.lock().unwrap().get(key).cloned())
  }

  fn write(&self, batch: Batch) -> Result {
    let mut map = self.map.lock().unwrap();

    for op in batch.ops {
      match op {
        Op::Put { key, value } => {
          map.insert(key, value);
        }
        Op::Delete { key } => {
          map.remove(&key);
        }
      }
    }

    Ok(())
  }

  fn scan(
    &self,
    lower: &[u8],
    upper: &[u8],
    visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
  ) -> Result {
    if lower >= upper {
      return Ok(());
    }

    for (key, value) in self.map.lock().unwrap().range(lower.to_vec()..upper.to_vec()) {
      if !visit(key, value) {
        break;
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn collect(store: &dyn Store, lower: &[u8], upper: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rows = Vec::new();
    store
      .scan(lower, upper, &mut |key, value| {
        rows.push((key.to_vec(), value.to_vec()));
        true
      })
      .unwrap();
    rows
  }

  #[test]
  fn memory_store_scan_bounds() {
    let store = MemoryStore::new();

    let mut batch = Batch::new();
    for byte in [1u8, 2, 3, 5] {
      batch.put(vec![byte], vec![byte * 10]);
    }
    store.write(batch).unwrap();

    assert_eq!(
      collect(&store, &[2], &[5]),
      vec![(vec![2], vec![20]), (vec![3], vec![30])],
    );

    assert_eq!(collect(&store, &[4], &[5]), Vec::new());
    assert_eq!(collect(&store, &[5], &[2]), Vec::new());
  }

  #[test]
  fn memory_store_scan_stops_early() {
    let store = MemoryStore::new();

    let mut batch = Batch::new();
    for byte in 0u8..10 {
      batch.put(vec![byte], Vec::new());
    }
    store.write(batch).unwrap();

    let mut visited = 0;
    store
      .scan(&[0], &[10], &mut |_, _| {
        visited += 1;
        visited < 3
      })
      .unwrap();

    assert_eq!(visited, 3);
  }

  #[test]
  fn level_db_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();

    {
      let store = LevelDb::open(&dir.path().join("db")).unwrap();

      let mut batch = Batch::new();
      batch.put(vec![1], vec![10]);
      batch.put(vec![2], vec![20]);
      batch.put(vec![3], vec![30]);
      store.write(batch).unwrap();

      let mut batch = Batch::new();
      batch.delete(vec![2]);
      store.write(batch).unwrap();
    }

    let store = LevelDb::open(&dir.path().join("db")).unwrap();

    assert_eq!(store.get(&[1]).unwrap(), Some(vec![10]));
    assert_eq!(store.get(&[2]).unwrap(), None);

    assert_eq!(
      collect(&store, &[0], &[255]),
      vec![(vec![1], vec![10]), (vec![3], vec![30])],
    );
  }
}
