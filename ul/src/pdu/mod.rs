#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PresentationContextProposed {
    pub id: u8,
    pub abstract_syntax: String,
    pub transfer_syntaxes: Vec<String>,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PresentationContextResult {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    pub transfer_syntax: String,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum PresentationContextResultReason {
    Acceptance = 0,
    UserRejection = 1,
    NoReason = 2,
    AbstractSyntaxNotSupported = 3,
    TransferSyntaxesNotSupported = 4,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJResult {
    Permanent,
    Transient,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJSource {
    ServiceUser(AssociationRJServiceUserReason),
    ServiceProviderASCE(AssociationRJServiceProviderASCEReason),
    ServiceProviderPresentation(AssociationRJServiceProviderPresentationReason),
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceUserReason {
    NoReasonGiven,
    ApplicationContextNameNotSupported,
    CallingAETitleNotRecognized,
    CalledAETitleNotRecognized,
    Reserved(u8),
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceProviderASCEReason {
    NoReasonGiven,
    ProtocolVersionNotSupported,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AssociationRJServiceProviderPresentationReason {
    TemporaryCongestion,
    LocalLimitExceeded,
    Reserved(u8),
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct PDataValue {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    pub is_last: bool,
    pub data: Vec<u8>,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum PDataValueType {
    Command,
    Data,
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AbortRQSource {
    ServiceUser,
    ServiceProvider(AbortRQServiceProviderReason),
    Reserved,
}

impl AbortRQSource {
    /// Decode the Source/Reason-Diag byte pair of an A-ABORT PDU.
    pub fn from(source: u8, reason: u8) -> Option<Self> {
        match source {
            0x00 => Some(AbortRQSource::ServiceUser),
            0x01 => Some(AbortRQSource::Reserved),
            0x02 => Some(AbortRQSource::ServiceProvider(match reason {
                0x00 => AbortRQServiceProviderReason::ReasonNotSpecified,
                0x01 => AbortRQServiceProviderReason::UnrecognizedPdu,
                0x02 => AbortRQServiceProviderReason::UnexpectedPdu,
                0x03 => AbortRQServiceProviderReason::Reserved,
                0x04 => AbortRQServiceProviderReason::UnrecognizedPduParameter,
                0x05 => AbortRQServiceProviderReason::UnexpectedPduParameter,
                0x06 => AbortRQServiceProviderReason::InvalidPduParameter,
                _ => return None,
            })),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum AbortRQServiceProviderReason {
    ReasonNotSpecified,
    UnrecognizedPdu,
    UnexpectedPdu,
    Reserved,
    UnrecognizedPduParameter,
    UnexpectedPduParameter,
    InvalidPduParameter,
}

impl AssociationRJResult {
    /// Decode the Result byte of an A-ASSOCIATE-RJ PDU.
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(AssociationRJResult::Permanent),
            0x02 => Some(AssociationRJResult::Transient),
            _ => None,
        }
    }
}

impl AssociationRJSource {
    /// Decode the Source/Reason-Diag byte pair of an A-ASSOCIATE-RJ PDU.
    pub fn from(source: u8, reason: u8) -> Option<Self> {
        match source {
            0x01 => Some(AssociationRJSource::ServiceUser(match reason {
                0x01 => AssociationRJServiceUserReason::NoReasonGiven,
                0x02 => AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
                0x03 => AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                0x07 => AssociationRJServiceUserReason::CalledAETitleNotRecognized,
                n => AssociationRJServiceUserReason::Reserved(n),
            })),
            0x02 => Some(AssociationRJSource::ServiceProviderASCE(match reason {
                0x01 => AssociationRJServiceProviderASCEReason::NoReasonGiven,
                0x02 => AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported,
                _ => return None,
            })),
            0x03 => Some(AssociationRJSource::ServiceProviderPresentation(
                match reason {
                    0x01 => AssociationRJServiceProviderPresentationReason::TemporaryCongestion,
                    0x02 => AssociationRJServiceProviderPresentationReason::LocalLimitExceeded,
                    n => AssociationRJServiceProviderPresentationReason::Reserved(n),
                },
            )),
            _ => None,
        }
    }
}

impl PresentationContextResultReason {
    /// Decode the Result/Reason byte of a presentation context result item.
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0 => Some(PresentationContextResultReason::Acceptance),
            1 => Some(PresentationContextResultReason::UserRejection),
            2 => Some(PresentationContextResultReason::NoReason),
            3 => Some(PresentationContextResultReason::AbstractSyntaxNotSupported),
            4 => Some(PresentationContextResultReason::TransferSyntaxesNotSupported),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum PduVariableItem {
    Unknown(u8),
    ApplicationContext(String),
    PresentationContextProposed(PresentationContextProposed),
    PresentationContextResult(PresentationContextResult),
    UserVariables(Vec<UserVariableItem>),
}

#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum UserVariableItem {
    Unknown(u8, Vec<u8>),
    MaxLength(u32),
    ImplementationClassUID(String),
    ImplementationVersionName(String),
    /// SOP Class Extended Negotiation Sub-Item: SOP class UID and opaque
    /// service-class-specific application information.
    SopClassExtendedNegotiationSubItem(String, Vec<u8>),
    /// User Identity Negotiation sub-item, as proposed by the requestor
    /// or acknowledged by the acceptor.
    UserIdentityItem(UserIdentity),
    /// Asynchronous Operations Window Negotiation sub-item: the maximum
    /// number of outstanding operations the sender will invoke, and the
    /// maximum number it will perform concurrently, on this association.
    AsynchronousOperationsWindow {
        max_operations_invoked: u16,
        max_operations_performed: u16,
    },
}

/// The kind of credential carried by a User Identity Negotiation sub-item,
/// as defined in PS3.7 Annex D.3.3.7.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum UserIdentityType {
    Username,
    UsernameAndPassword,
    Kerberos,
    Saml,
    Jwt,
}

impl UserIdentityType {
    /// Decode the User-Identity-Type byte.
    pub fn from(value: u8) -> Option<Self> {
        match value {
            1 => Some(UserIdentityType::Username),
            2 => Some(UserIdentityType::UsernameAndPassword),
            3 => Some(UserIdentityType::Kerberos),
            4 => Some(UserIdentityType::Saml),
            5 => Some(UserIdentityType::Jwt),
            _ => None,
        }
    }

    /// Encode this identity type as its wire byte value.
    pub fn to_u8(self) -> u8 {
        match self {
            UserIdentityType::Username => 1,
            UserIdentityType::UsernameAndPassword => 2,
            UserIdentityType::Kerberos => 3,
            UserIdentityType::Saml => 4,
            UserIdentityType::Jwt => 5,
        }
    }
}

/// A User Identity Negotiation sub-item.
///
/// The primary and secondary fields are kept as raw bytes:
/// depending on the identity type they hold a username, a password,
/// a Kerberos service ticket or a SAML/JWT assertion.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct UserIdentity {
    positive_response_requested: bool,
    identity_type: UserIdentityType,
    primary_field: Vec<u8>,
    secondary_field: Vec<u8>,
}

impl UserIdentity {
    /// Construct a new user identity sub-item.
    pub fn new(
        positive_response_requested: bool,
        identity_type: UserIdentityType,
        primary_field: Vec<u8>,
        secondary_field: Vec<u8>,
    ) -> Self {
        UserIdentity {
            positive_response_requested,
            identity_type,
            primary_field,
            secondary_field,
        }
    }

    /// Whether the requestor wants the acceptor to send back a response.
    pub fn positive_response_requested(&self) -> bool {
        self.positive_response_requested
    }

    /// The kind of credential carried by this item.
    pub fn identity_type(&self) -> UserIdentityType {
        self.identity_type
    }

    /// The primary credential field (e.g. username, Kerberos ticket).
    pub fn primary_field(&self) -> &[u8] {
        &self.primary_field
    }

    /// The secondary credential field (e.g. password), empty unless
    /// `identity_type` is [`UserIdentityType::UsernameAndPassword`].
    pub fn secondary_field(&self) -> &[u8] {
        &self.secondary_field
    }
}

/// The contents of an A-ASSOCIATE-RQ PDU.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationRQ {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextProposed>,
    pub user_variables: Vec<UserVariableItem>,
}

/// The contents of an A-ASSOCIATE-AC PDU.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationAC {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextResult>,
    pub user_variables: Vec<UserVariableItem>,
}

/// The contents of an A-ASSOCIATE-RJ PDU.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct AssociationRJ {
    pub result: AssociationRJResult,
    pub source: AssociationRJSource,
}

/// A DICOM Upper Layer Protocol Data Unit.
///
/// This is the unit of exchange between two DICOM nodes at the
/// association level, before presentation data values are interpreted
/// as DIMSE messages.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum Pdu {
    /// A PDU of a type that this implementation does not recognize.
    /// Its raw body is kept so that it can be logged or re-emitted.
    Unknown { pdu_type: u8, data: Vec<u8> },
    /// A-ASSOCIATE-RQ
    AssociationRQ(AssociationRQ),
    /// A-ASSOCIATE-AC
    AssociationAC(AssociationAC),
    /// A-ASSOCIATE-RJ
    AssociationRJ(AssociationRJ),
    /// P-DATA-TF
    PData { data: Vec<PDataValue> },
    /// A-RELEASE-RQ
    ReleaseRQ,
    /// A-RELEASE-RP
    ReleaseRP,
    /// A-ABORT
    AbortRQ { source: AbortRQSource },
}

/// An error occurring while writing a PDU to a byte stream.
#[derive(Debug, snafu::Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("could not write field `{}`", field))]
    WriteField {
        field: &'static str,
        source: std::io::Error,
        backtrace: snafu::Backtrace,
    },
    #[snafu(display("could not write {} reserved bytes", bytes))]
    WriteReserved {
        bytes: u32,
        source: std::io::Error,
        backtrace: snafu::Backtrace,
    },
    #[snafu(display("could not write chunk `{}`", name))]
    WriteChunk {
        name: &'static str,
        #[snafu(backtrace)]
        source: writer::WriteChunkError,
    },
    #[cfg(feature = "async")]
    #[snafu(display("could not write chunk `{}`", name))]
    WriteChunkAsync {
        name: &'static str,
        #[snafu(backtrace)]
        source: writer_nonblocking::WriteChunkError,
    },
    #[snafu(display("could not encode field `{}`", field))]
    EncodeField {
        field: &'static str,
        #[snafu(backtrace)]
        source: dicom_encoding::text::EncodeTextError,
    },
}

pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod writer_nonblocking;

pub mod commands;
pub mod generated;

pub use reader::read_pdu;
pub use writer::write_pdu;
