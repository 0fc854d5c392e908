//! Segment groups: named namespaces of segments.
//!
//! A group maps to one directory under the cache root; each of its segments
//! is a file named after the segment id:
//!
//! ```text
//! {root}/
//! └── {group}/
//!     ├── 3f9a04c2d1e0b877   <- segment file
//!     └── a0c1f5e6b7d8c9e0
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use larder_types::SegmentId;

use crate::{CacheError, CacheResult, Segment};

/// A named set of live segments.
///
/// Only registered segments are listed. A deregistered segment disappears
/// from the group immediately, even while its teardown is still queued.
#[derive(Debug)]
pub struct SegmentGroup {
    name: String,
    dir: PathBuf,
    segments: Mutex<Vec<Arc<Segment>>>,
}

impl SegmentGroup {
    pub(crate) fn new(name: &str, root: &Path) -> CacheResult<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            dir: root.join(name),
            segments: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding this group's segment files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the backing file for segment `id`.
    pub fn path_for(&self, id: SegmentId) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Snapshot of the live segments, in registration order.
    pub fn segments(&self) -> Vec<Arc<Segment>> {
        self.lock().clone()
    }

    pub fn find(&self, id: SegmentId) -> Option<Arc<Segment>> {
        self.lock().iter().find(|s| s.id() == id).cloned()
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.lock().iter().any(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn insert(&self, segment: Arc<Segment>) {
        self.lock().push(segment);
    }

    /// Adds `segment` unless one with the same id is already listed, and
    /// returns the listed one.
    pub(crate) fn insert_or_get(&self, segment: Arc<Segment>) -> Arc<Segment> {
        let mut segments = self.lock();
        if let Some(existing) = segments.iter().find(|s| s.id() == segment.id()) {
            return Arc::clone(existing);
        }
        segments.push(Arc::clone(&segment));
        segment
    }

    pub(crate) fn remove(&self, id: SegmentId) -> Option<Arc<Segment>> {
        let mut segments = self.lock();
        let index = segments.iter().position(|s| s.id() == id)?;
        Some(segments.remove(index))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Segment>>> {
        self.segments.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Group names become a single directory component.
fn validate_name(name: &str) -> CacheResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || Path::new(name).is_absolute();
    if bad {
        return Err(CacheError::InvalidGroupName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn path_layout() {
        let group = SegmentGroup::new("fonts", Path::new("/cache")).unwrap();
        assert_eq!(group.dir(), Path::new("/cache/fonts"));
        assert_eq!(
            group.path_for(SegmentId::new(0xabc)),
            PathBuf::from("/cache/fonts/0000000000000abc")
        );
    }

    #[test_case(""; "empty")]
    #[test_case("."; "dot")]
    #[test_case(".."; "dot dot")]
    #[test_case("a/b"; "slash")]
    #[test_case("a\\b"; "backslash")]
    #[test_case("nul\0"; "nul byte")]
    fn invalid_names_rejected(name: &str) {
        assert!(matches!(
            SegmentGroup::new(name, Path::new("/cache")),
            Err(CacheError::InvalidGroupName { .. })
        ));
    }

    #[test_case("fonts"; "plain")]
    #[test_case("baked-assets.v2"; "punctuation")]
    #[test_case("..hidden"; "leading dots")]
    fn valid_names_accepted(name: &str) {
        assert!(SegmentGroup::new(name, Path::new("/cache")).is_ok());
    }

    #[test]
    fn membership() {
        let group = SegmentGroup::new("g", Path::new("/cache")).unwrap();
        let a = Arc::new(Segment::new(SegmentId::new(1), "g", group.path_for(SegmentId::new(1))));
        let b = Arc::new(Segment::new(SegmentId::new(2), "g", group.path_for(SegmentId::new(2))));

        group.insert(Arc::clone(&a));
        group.insert(Arc::clone(&b));
        assert_eq!(group.len(), 2);
        assert!(group.contains(SegmentId::new(2)));

        let removed = group.remove(SegmentId::new(1)).unwrap();
        assert!(Arc::ptr_eq(&removed, &a));
        assert!(group.find(SegmentId::new(1)).is_none());
        assert!(group.remove(SegmentId::new(1)).is_none());
        assert_eq!(group.segments().len(), 1);
    }

    #[test]
    fn insert_or_get_keeps_first() {
        let group = SegmentGroup::new("g", Path::new("/cache")).unwrap();
        let id = SegmentId::new(9);
        let first = Arc::new(Segment::new(id, "g", group.path_for(id)));
        let second = Arc::new(Segment::new(id, "g", group.path_for(id)));

        let listed = group.insert_or_get(Arc::clone(&first));
        assert!(Arc::ptr_eq(&listed, &first));
        let listed = group.insert_or_get(second);
        assert!(Arc::ptr_eq(&listed, &first));
        assert_eq!(group.len(), 1);
    }
}
