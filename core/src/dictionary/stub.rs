//! An empty data dictionary, useful as a placeholder where a dictionary
//! is required by the API but attribute names are not needed.

use crate::dictionary::data_element::{DataDictionary, DataDictionaryEntryRef};
use crate::header::Tag;

/// A data dictionary which holds no entries.
///
/// Lookups through this dictionary always return `None`;
/// unrecognized tags are resolved to `UN` by callers instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StubDataDictionary;

impl DataDictionary for StubDataDictionary {
    type Entry = DataDictionaryEntryRef<'static>;

    fn by_tag(&self, _tag: Tag) -> Option<&Self::Entry> {
        None
    }

    fn by_name(&self, _name: &str) -> Option<&Self::Entry> {
        None
    }
}
