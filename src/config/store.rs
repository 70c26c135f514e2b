//! The configuration store.
//!
//! A chained hash table mapping variable names to [`Variable`] records. The
//! store owns deep copies of everything it holds: `define` and `set` copy the
//! caller's variable in, `get` copies the stored one out. No caller ever holds
//! a reference into the table.
//!
//! The table has an explicit lifecycle. A [`ConfigStore`] starts out
//! uninitialized; [`ConfigStore::init`] creates the table and
//! [`ConfigStore::teardown`] releases it. Every other operation fails with
//! [`Error::NotInitialized`] outside that window.
//!
//! Writers take an exclusive lock and readers a shared one, so plugins may
//! query the store from several threads after startup.

use super::value::{Values, VarType, Variable};
use crate::{Error, Result};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Bucket count of a freshly created table.
pub const DEFAULT_BUCKETS: usize = 100;

/// Average chain length that triggers doubling the bucket count.
const MAX_LOAD: usize = 4;

/// Multiplicative rolling hash over the bytes of a name.
pub fn hash_name(name: &str) -> u64 {
    name.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// Check a variable name.
///
/// Valid names are one or more `[A-Za-z_]+` segments joined by `.`, with an
/// optional trailing `.` (directive keys such as `group.`).
pub fn is_valid_name(name: &str) -> bool {
    let body = name.strip_suffix('.').unwrap_or(name);
    !body.is_empty()
        && body.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
        })
}

struct Table {
    buckets: Vec<Vec<Variable>>,
    len: usize,
}

impl Table {
    fn new(buckets: usize) -> Self {
        Self {
            buckets: (0..buckets).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    fn index(&self, name: &str) -> usize {
        (hash_name(name) % self.buckets.len() as u64) as usize
    }

    fn find(&self, name: &str) -> Option<&Variable> {
        self.buckets[self.index(name)]
            .iter()
            .find(|var| var.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let index = self.index(name);
        self.buckets[index].iter_mut().find(|var| var.name == name)
    }

    /// Append to the bucket chain. The caller has checked the name is absent.
    fn insert_new(&mut self, var: Variable) {
        if self.len + 1 > self.buckets.len() * MAX_LOAD {
            self.grow();
        }
        let index = self.index(&var.name);
        self.buckets[index].push(var);
        self.len += 1;
    }

    fn grow(&mut self) {
        let mut grown = Table::new(self.buckets.len() * 2);
        for chain in std::mem::take(&mut self.buckets) {
            for var in chain {
                let index = grown.index(&var.name);
                grown.buckets[index].push(var);
            }
        }
        debug!(buckets = grown.buckets.len(), "config table grown");
        self.buckets = grown.buckets;
    }

    fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.buckets.iter().flatten()
    }
}

/// Process-wide typed key/value store with copy-in/copy-out access.
pub struct ConfigStore {
    table: RwLock<Option<Table>>,
    initial_buckets: usize,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Create an uninitialized store with the default bucket count.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create an uninitialized store whose table starts with `buckets` chains.
    pub fn with_buckets(buckets: usize) -> Self {
        Self {
            table: RwLock::new(None),
            initial_buckets: buckets.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Table>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Table>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the table. Fails if it already exists.
    pub fn init(&self) -> Result<()> {
        let mut guard = self.write();
        if guard.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        *guard = Some(Table::new(self.initial_buckets));
        debug!(buckets = self.initial_buckets, "config table created");
        Ok(())
    }

    /// Release every variable and the table itself.
    pub fn teardown(&self) -> Result<()> {
        let table = self.write().take().ok_or(Error::NotInitialized)?;
        debug!(variables = table.len, "config table destroyed");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_some()
    }

    /// Insert a copy of `var` unless a variable with that name exists.
    pub fn define(&self, var: &Variable) -> Result<()> {
        check_name(&var.name)?;
        let mut guard = self.write();
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        if table.find(&var.name).is_some() {
            return Err(Error::DuplicateKey(var.name.clone()));
        }
        table.insert_new(var.clone());
        Ok(())
    }

    /// Insert a copy of `var`, replacing any variable with that name.
    pub fn set(&self, var: &Variable) -> Result<()> {
        check_name(&var.name)?;
        let mut guard = self.write();
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        match table.find_mut(&var.name) {
            Some(existing) => *existing = var.clone(),
            None => table.insert_new(var.clone()),
        }
        Ok(())
    }

    /// Copy out the variable called `name`.
    pub fn get(&self, name: &str) -> Result<Option<Variable>> {
        let guard = self.read();
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        Ok(table.find(name).cloned())
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let guard = self.read();
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        Ok(table.find(name).is_some())
    }

    /// Number of variables held.
    pub fn len(&self) -> Result<usize> {
        let guard = self.read();
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        Ok(table.len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copies of every variable, sorted by name.
    pub fn snapshot(&self) -> Result<Vec<Variable>> {
        let guard = self.read();
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        let mut vars: Vec<Variable> = table.iter().cloned().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vars)
    }

    /// First string of `name`.
    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        self.typed(name, VarType::String, |values| match values {
            Values::String(v) => v.into_iter().next(),
            _ => None,
        })
    }

    /// Every string of `name`.
    pub fn get_strings(&self, name: &str) -> Result<Option<Vec<String>>> {
        self.typed(name, VarType::String, |values| match values {
            Values::String(v) => Some(v),
            _ => None,
        })
    }

    /// First integer of `name`.
    pub fn get_integer(&self, name: &str) -> Result<Option<i64>> {
        self.typed(name, VarType::Integer, |values| match values {
            Values::Integer(v) => v.first().copied(),
            _ => None,
        })
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: VarType,
        extract: impl FnOnce(Values) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(var) = self.get(name)? else {
            return Ok(None);
        };
        let found = var.var_type();
        let values = var
            .into_values()
            .ok_or_else(|| Error::Undefined(name.to_string()))?;
        let value = extract(values).ok_or_else(|| Error::TypeMismatch {
            name: name.to_string(),
            expected,
            found,
        })?;
        Ok(Some(value))
    }
}

fn check_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}
