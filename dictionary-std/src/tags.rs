//! Declarative constants for the standard data dictionary.
//!
//! Each constant resolves to the DICOM tag of an attribute as defined
//! in [DICOM PS3.6](https://dicom.nema.org/medical/dicom/current/output/chtml/part06/ps3.6.html),
//! by its dictionary alias. These constants can be used to work with
//! specific DICOM attributes without the cost of a dictionary lookup.
//!
//! The private [`ENTRIES`] table is what actually populates the
//! standard data dictionary at start-up; see [`crate::data_element`].

use dicom_core::dictionary::{DataDictionaryEntryRef, TagRange::*, VirtualVr::*};
use dicom_core::Tag;
use dicom_core::VR::*;

/// Affected SOP Class UID
#[rustfmt::skip]
pub const AFFECTED_SOP_CLASS_UID: Tag = Tag(0x0000, 0x0002);
/// Affected SOP Instance UID
#[rustfmt::skip]
pub const AFFECTED_SOP_INSTANCE_UID: Tag = Tag(0x0000, 0x1000);
/// Requested SOP Class UID
#[rustfmt::skip]
pub const REQUESTED_SOP_CLASS_UID: Tag = Tag(0x0000, 0x1001);
/// Requested SOP Instance UID
#[rustfmt::skip]
pub const REQUESTED_SOP_INSTANCE_UID: Tag = Tag(0x0000, 0x1011);
/// Event Type ID
#[rustfmt::skip]
pub const EVENT_TYPE_ID: Tag = Tag(0x0000, 0x1002);
/// Attribute Identifier List
#[rustfmt::skip]
pub const ATTRIBUTE_IDENTIFIER_LIST: Tag = Tag(0x0000, 0x1005);
/// Action Type ID
#[rustfmt::skip]
pub const ACTION_TYPE_ID: Tag = Tag(0x0000, 0x1008);
/// Anatomic Region Modifier Sequence
#[rustfmt::skip]
pub const ANATOMIC_REGION_MODIFIER_SEQUENCE: Tag = Tag(0x0008, 0x2220);
/// Anatomic Region Sequence
#[rustfmt::skip]
pub const ANATOMIC_REGION_SEQUENCE: Tag = Tag(0x0008, 0x2218);
/// Bits Allocated
#[rustfmt::skip]
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
/// Bits Stored
#[rustfmt::skip]
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
/// Burned In Annotation
#[rustfmt::skip]
pub const BURNED_IN_ANNOTATION: Tag = Tag(0x0028, 0x0301);
/// Code Meaning
#[rustfmt::skip]
pub const CODE_MEANING: Tag = Tag(0x0008, 0x0104);
/// Code Value
#[rustfmt::skip]
pub const CODE_VALUE: Tag = Tag(0x0008, 0x0100);
/// Coding Scheme Designator
#[rustfmt::skip]
pub const CODING_SCHEME_DESIGNATOR: Tag = Tag(0x0008, 0x0102);
/// Columns
#[rustfmt::skip]
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
/// Command Data Set Type
#[rustfmt::skip]
pub const COMMAND_DATA_SET_TYPE: Tag = Tag(0x0000, 0x0800);
/// Command Field
#[rustfmt::skip]
pub const COMMAND_FIELD: Tag = Tag(0x0000, 0x0100);
/// Command Group Length
#[rustfmt::skip]
pub const COMMAND_GROUP_LENGTH: Tag = Tag(0x0000, 0x0000);
/// Concept Code Sequence
#[rustfmt::skip]
pub const CONCEPT_CODE_SEQUENCE: Tag = Tag(0x0040, 0xA168);
/// Concept Name Code Sequence
#[rustfmt::skip]
pub const CONCEPT_NAME_CODE_SEQUENCE: Tag = Tag(0x0040, 0xA043);
/// Content Sequence
#[rustfmt::skip]
pub const CONTENT_SEQUENCE: Tag = Tag(0x0040, 0xA730);
/// Encapsulated Pixel Data Value Total Length
#[rustfmt::skip]
pub const ENCAPSULATED_PIXEL_DATA_VALUE_TOTAL_LENGTH: Tag = Tag(0x7FE0, 0x0003);
/// File Meta Information Group Length
#[rustfmt::skip]
pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// High Bit
#[rustfmt::skip]
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
/// Implementation Class UID
#[rustfmt::skip]
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
/// Implementation Version Name
#[rustfmt::skip]
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);
/// Instance Number
#[rustfmt::skip]
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
/// Institution Name
#[rustfmt::skip]
pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
/// Lossy Image Compression
#[rustfmt::skip]
pub const LOSSY_IMAGE_COMPRESSION: Tag = Tag(0x0028, 0x2110);
/// Lossy Image Compression Method
#[rustfmt::skip]
pub const LOSSY_IMAGE_COMPRESSION_METHOD: Tag = Tag(0x0028, 0x2114);
/// Lossy Image Compression Ratio
#[rustfmt::skip]
pub const LOSSY_IMAGE_COMPRESSION_RATIO: Tag = Tag(0x0028, 0x2112);
/// Media Storage SOP Class UID
#[rustfmt::skip]
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
/// Media Storage SOP Instance UID
#[rustfmt::skip]
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
/// Message ID
#[rustfmt::skip]
pub const MESSAGE_ID: Tag = Tag(0x0000, 0x0110);
/// Message ID Being Responded To
#[rustfmt::skip]
pub const MESSAGE_ID_BEING_RESPONDED_TO: Tag = Tag(0x0000, 0x0120);
/// Modality
#[rustfmt::skip]
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
/// Move Destination
#[rustfmt::skip]
pub const MOVE_DESTINATION: Tag = Tag(0x0000, 0x0600);
/// Move Originator Application Entity Title
#[rustfmt::skip]
pub const MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0000, 0x1030);
/// Move Originator Message ID
#[rustfmt::skip]
pub const MOVE_ORIGINATOR_MESSAGE_ID: Tag = Tag(0x0000, 0x1031);
/// Number Of Completed Suboperations
#[rustfmt::skip]
pub const NUMBER_OF_COMPLETED_SUBOPERATIONS: Tag = Tag(0x0000, 0x1021);
/// Number Of Failed Suboperations
#[rustfmt::skip]
pub const NUMBER_OF_FAILED_SUBOPERATIONS: Tag = Tag(0x0000, 0x1022);
/// Number Of Frames
#[rustfmt::skip]
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
/// Number Of Remaining Suboperations
#[rustfmt::skip]
pub const NUMBER_OF_REMAINING_SUBOPERATIONS: Tag = Tag(0x0000, 0x1020);
/// Number Of Warning Suboperations
#[rustfmt::skip]
pub const NUMBER_OF_WARNING_SUBOPERATIONS: Tag = Tag(0x0000, 0x1023);
/// Operators Name
#[rustfmt::skip]
pub const OPERATORS_NAME: Tag = Tag(0x0008, 0x1070);
/// Patient Address
#[rustfmt::skip]
pub const PATIENT_ADDRESS: Tag = Tag(0x0010, 0x1040);
/// Patient Age
#[rustfmt::skip]
pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);
/// Patient Birth Date
#[rustfmt::skip]
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);
/// Patient Name
#[rustfmt::skip]
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
/// Photometric Interpretation
#[rustfmt::skip]
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
/// Pixel Data
#[rustfmt::skip]
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
/// Pixel Representation
#[rustfmt::skip]
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
/// Planar Configuration
#[rustfmt::skip]
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
/// Priority
#[rustfmt::skip]
pub const PRIORITY: Tag = Tag(0x0000, 0x0700);
/// Private Information Creator UID
#[rustfmt::skip]
pub const PRIVATE_INFORMATION_CREATOR_UID: Tag = Tag(0x0007, 0x0010);
/// Receiving Application Entity Title
#[rustfmt::skip]
pub const RECEIVING_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0000, 0x1035);
/// Region Spatial Format
#[rustfmt::skip]
pub const REGION_SPATIAL_FORMAT: Tag = Tag(0x0018, 0x6012);
/// Requesting Physician
#[rustfmt::skip]
pub const REQUESTING_PHYSICIAN: Tag = Tag(0x0032, 0x1032);
/// Rescale Intercept
#[rustfmt::skip]
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
/// Rescale Slope
#[rustfmt::skip]
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
/// Rows
#[rustfmt::skip]
pub const ROWS: Tag = Tag(0x0028, 0x0010);
/// Samples Per Pixel
#[rustfmt::skip]
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
/// Sending Application Entity Title
#[rustfmt::skip]
pub const SENDING_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0000, 0x1034);
/// Sequence Of Ultrasound Regions
#[rustfmt::skip]
pub const SEQUENCE_OF_ULTRASOUND_REGIONS: Tag = Tag(0x0018, 0x6011);
/// Series Instance UID
#[rustfmt::skip]
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
/// SOP Class UID
#[rustfmt::skip]
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
/// SOP Instance UID
#[rustfmt::skip]
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
/// Source Application Entity Title
#[rustfmt::skip]
pub const SOURCE_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0002, 0x0016);
/// Status
#[rustfmt::skip]
pub const STATUS: Tag = Tag(0x0000, 0x0900);
/// Study Description
#[rustfmt::skip]
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
/// Study Instance UID
#[rustfmt::skip]
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
/// Transfer Syntax UID
#[rustfmt::skip]
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);

type E = DataDictionaryEntryRef<'static>;

/// The table of standard data dictionary entries used to populate
/// the registry in [`crate::data_element`] at start-up.
#[rustfmt::skip]
pub(crate) const ENTRIES: &[E] = &[
    E { tag: Single(AFFECTED_SOP_CLASS_UID), alias: "AffectedSOPClassUID", vr: Exact(UI) },
    E { tag: Single(AFFECTED_SOP_INSTANCE_UID), alias: "AffectedSOPInstanceUID", vr: Exact(UI) },
    E { tag: Single(REQUESTED_SOP_CLASS_UID), alias: "RequestedSOPClassUID", vr: Exact(UI) },
    E { tag: Single(REQUESTED_SOP_INSTANCE_UID), alias: "RequestedSOPInstanceUID", vr: Exact(UI) },
    E { tag: Single(EVENT_TYPE_ID), alias: "EventTypeID", vr: Exact(US) },
    E { tag: Single(ATTRIBUTE_IDENTIFIER_LIST), alias: "AttributeIdentifierList", vr: Exact(AT) },
    E { tag: Single(ACTION_TYPE_ID), alias: "ActionTypeID", vr: Exact(US) },
    E { tag: Single(ANATOMIC_REGION_SEQUENCE), alias: "AnatomicRegionSequence", vr: Exact(SQ) },
    E { tag: Single(ANATOMIC_REGION_MODIFIER_SEQUENCE), alias: "AnatomicRegionModifierSequence", vr: Exact(SQ) },
    E { tag: Single(BITS_ALLOCATED), alias: "BitsAllocated", vr: Exact(US) },
    E { tag: Single(BITS_STORED), alias: "BitsStored", vr: Exact(US) },
    E { tag: Single(BURNED_IN_ANNOTATION), alias: "BurnedInAnnotation", vr: Exact(CS) },
    E { tag: Single(CODE_VALUE), alias: "CodeValue", vr: Exact(SH) },
    E { tag: Single(CODING_SCHEME_DESIGNATOR), alias: "CodingSchemeDesignator", vr: Exact(SH) },
    E { tag: Single(CODE_MEANING), alias: "CodeMeaning", vr: Exact(LO) },
    E { tag: Single(COLUMNS), alias: "Columns", vr: Exact(US) },
    E { tag: Single(COMMAND_GROUP_LENGTH), alias: "CommandGroupLength", vr: Exact(UL) },
    E { tag: Single(COMMAND_FIELD), alias: "CommandField", vr: Exact(US) },
    E { tag: Single(COMMAND_DATA_SET_TYPE), alias: "CommandDataSetType", vr: Exact(US) },
    E { tag: Single(CONCEPT_NAME_CODE_SEQUENCE), alias: "ConceptNameCodeSequence", vr: Exact(SQ) },
    E { tag: Single(CONCEPT_CODE_SEQUENCE), alias: "ConceptCodeSequence", vr: Exact(SQ) },
    E { tag: Single(CONTENT_SEQUENCE), alias: "ContentSequence", vr: Exact(SQ) },
    E { tag: Single(ENCAPSULATED_PIXEL_DATA_VALUE_TOTAL_LENGTH), alias: "EncapsulatedPixelDataValueTotalLength", vr: Exact(UV) },
    E { tag: Single(FILE_META_INFORMATION_GROUP_LENGTH), alias: "FileMetaInformationGroupLength", vr: Exact(UL) },
    E { tag: Single(HIGH_BIT), alias: "HighBit", vr: Exact(US) },
    E { tag: Single(IMPLEMENTATION_CLASS_UID), alias: "ImplementationClassUID", vr: Exact(UI) },
    E { tag: Single(IMPLEMENTATION_VERSION_NAME), alias: "ImplementationVersionName", vr: Exact(SH) },
    E { tag: Single(INSTANCE_NUMBER), alias: "InstanceNumber", vr: Exact(IS) },
    E { tag: Single(INSTITUTION_NAME), alias: "InstitutionName", vr: Exact(LO) },
    E { tag: Single(LOSSY_IMAGE_COMPRESSION), alias: "LossyImageCompression", vr: Exact(CS) },
    E { tag: Single(LOSSY_IMAGE_COMPRESSION_RATIO), alias: "LossyImageCompressionRatio", vr: Exact(DS) },
    E { tag: Single(LOSSY_IMAGE_COMPRESSION_METHOD), alias: "LossyImageCompressionMethod", vr: Exact(CS) },
    E { tag: Single(MEDIA_STORAGE_SOP_CLASS_UID), alias: "MediaStorageSOPClassUID", vr: Exact(UI) },
    E { tag: Single(MEDIA_STORAGE_SOP_INSTANCE_UID), alias: "MediaStorageSOPInstanceUID", vr: Exact(UI) },
    E { tag: Single(MESSAGE_ID), alias: "MessageID", vr: Exact(US) },
    E { tag: Single(MESSAGE_ID_BEING_RESPONDED_TO), alias: "MessageIDBeingRespondedTo", vr: Exact(US) },
    E { tag: Single(MODALITY), alias: "Modality", vr: Exact(CS) },
    E { tag: Single(MOVE_DESTINATION), alias: "MoveDestination", vr: Exact(AE) },
    E { tag: Single(MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE), alias: "MoveOriginatorApplicationEntityTitle", vr: Exact(AE) },
    E { tag: Single(MOVE_ORIGINATOR_MESSAGE_ID), alias: "MoveOriginatorMessageID", vr: Exact(US) },
    E { tag: Single(NUMBER_OF_REMAINING_SUBOPERATIONS), alias: "NumberOfRemainingSuboperations", vr: Exact(US) },
    E { tag: Single(NUMBER_OF_COMPLETED_SUBOPERATIONS), alias: "NumberOfCompletedSuboperations", vr: Exact(US) },
    E { tag: Single(NUMBER_OF_FAILED_SUBOPERATIONS), alias: "NumberOfFailedSuboperations", vr: Exact(US) },
    E { tag: Single(NUMBER_OF_WARNING_SUBOPERATIONS), alias: "NumberOfWarningSuboperations", vr: Exact(US) },
    E { tag: Single(NUMBER_OF_FRAMES), alias: "NumberOfFrames", vr: Exact(IS) },
    E { tag: Single(OPERATORS_NAME), alias: "OperatorsName", vr: Exact(PN) },
    E { tag: Single(PATIENT_NAME), alias: "PatientName", vr: Exact(PN) },
    E { tag: Single(PATIENT_BIRTH_DATE), alias: "PatientBirthDate", vr: Exact(DA) },
    E { tag: Single(PATIENT_ADDRESS), alias: "PatientAddress", vr: Exact(LO) },
    E { tag: Single(PATIENT_AGE), alias: "PatientAge", vr: Exact(AS) },
    E { tag: Single(PHOTOMETRIC_INTERPRETATION), alias: "PhotometricInterpretation", vr: Exact(CS) },
    E { tag: Single(PIXEL_REPRESENTATION), alias: "PixelRepresentation", vr: Exact(US) },
    E { tag: Single(PLANAR_CONFIGURATION), alias: "PlanarConfiguration", vr: Exact(US) },
    E { tag: Single(PRIORITY), alias: "Priority", vr: Exact(US) },
    E { tag: Single(PRIVATE_INFORMATION_CREATOR_UID), alias: "PrivateInformationCreatorUID", vr: Exact(UI) },
    E { tag: Single(RECEIVING_APPLICATION_ENTITY_TITLE), alias: "ReceivingApplicationEntityTitle", vr: Exact(AE) },
    E { tag: Single(REGION_SPATIAL_FORMAT), alias: "RegionSpatialFormat", vr: Exact(US) },
    E { tag: Single(REQUESTING_PHYSICIAN), alias: "RequestingPhysician", vr: Exact(PN) },
    E { tag: Single(RESCALE_INTERCEPT), alias: "RescaleIntercept", vr: Exact(DS) },
    E { tag: Single(RESCALE_SLOPE), alias: "RescaleSlope", vr: Exact(DS) },
    E { tag: Single(ROWS), alias: "Rows", vr: Exact(US) },
    E { tag: Single(SAMPLES_PER_PIXEL), alias: "SamplesPerPixel", vr: Exact(US) },
    E { tag: Single(SENDING_APPLICATION_ENTITY_TITLE), alias: "SendingApplicationEntityTitle", vr: Exact(AE) },
    E { tag: Single(SEQUENCE_OF_ULTRASOUND_REGIONS), alias: "SequenceOfUltrasoundRegions", vr: Exact(SQ) },
    E { tag: Single(SERIES_INSTANCE_UID), alias: "SeriesInstanceUID", vr: Exact(UI) },
    E { tag: Single(SOP_CLASS_UID), alias: "SOPClassUID", vr: Exact(UI) },
    E { tag: Single(SOP_INSTANCE_UID), alias: "SOPInstanceUID", vr: Exact(UI) },
    E { tag: Single(SOURCE_APPLICATION_ENTITY_TITLE), alias: "SourceApplicationEntityTitle", vr: Exact(AE) },
    E { tag: Single(STATUS), alias: "Status", vr: Exact(US) },
    E { tag: Single(STUDY_DESCRIPTION), alias: "StudyDescription", vr: Exact(LO) },
    E { tag: Single(STUDY_INSTANCE_UID), alias: "StudyInstanceUID", vr: Exact(UI) },
    E { tag: Single(TRANSFER_SYNTAX_UID), alias: "TransferSyntaxUID", vr: Exact(UI) },
    E { tag: Single(PIXEL_DATA), alias: "PixelData", vr: Px },
    E { tag: Group100(Tag(0x6000, 0x3000)), alias: "OverlayData", vr: Ox },
];
