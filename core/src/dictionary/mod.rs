//! This module contains the concept of a DICOM data dictionary, and the
//! attribute operation types used to select and describe the subject of
//! a dictionary entry.
//!
//! For most purposes, the standard data dictionary
//! (provided by the `dicom-dictionary-std` crate)
//! is sufficient; this crate only defines the trait contracts
//! that such a dictionary must fulfill.

pub mod data_element;
pub mod stub;
pub mod uid;

pub use self::data_element::{
    DataDictionary, DataDictionaryEntry, DataDictionaryEntryBuf, DataDictionaryEntryRef,
    ParseSelectorError, TagByName, TagRange, TagRangeParseError, VirtualVr,
};
pub use self::uid::{UidDictionary, UidDictionaryEntry};
