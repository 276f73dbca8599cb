//! Association acceptor module
use std::{
    borrow::Cow,
    collections::HashSet,
    net::{TcpListener, TcpStream, ToSocketAddrs},
};

use snafu::{ensure, ResultExt, Snafu};

use crate::pdu::{
    reader::read_pdu,
    writer::write_pdu,
    AssociationAC, AssociationRJ, AssociationRJResult, AssociationRJSource,
    AssociationRJServiceUserReason, Pdu, PresentationContextResult,
    PresentationContextResultReason, UserVariableItem,
};

use super::scp::choose_supported;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// failed to bind to the given address
    Bind { source: std::io::Error },

    /// failed to accept an incoming connection
    Accept { source: std::io::Error },

    /// failed to receive association request
    ReceiveRequest { source: crate::pdu::reader::Error },

    /// failed to send association response
    SendResponse { source: crate::pdu::writer::Error },

    #[snafu(display("unexpected request from client `{:?}`", pdu))]
    #[non_exhaustive]
    UnexpectedRequest {
        /// the PDU obtained from the client
        pdu: Pdu,
    },

    /// the requested called AE title did not match this node's AE title
    AeTitleMismatch,

    /// no presentation context was proposed with a supported
    /// abstract syntax and transfer syntax combination
    NoAcceptedPresentationContexts,

    /// failed to send PDU message
    #[non_exhaustive]
    Send { source: crate::pdu::writer::Error },

    /// failed to receive PDU message
    #[non_exhaustive]
    Receive { source: crate::pdu::reader::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A DICOM association builder for a service class provider (SCP).
///
/// The final outcome is a [`ServerAssociation`], obtained after a
/// client has proposed an association and this node has accepted it,
/// negotiating the presentation contexts it is willing to support.
///
/// # Example
///
/// ```no_run
/// # use dicom_ul::association::server::ServerAssociationOptions;
/// # use std::net::TcpListener;
///
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("0.0.0.0:104")?;
/// let (stream, _addr) = listener.accept()?;
/// let association = ServerAssociationOptions::new()
///    .ae_title("THIS-SCP")
///    .with_abstract_syntax("1.2.840.10008.1.1")
///    .with_transfer_syntax("1.2.840.10008.1.2.1")
///    .establish(stream)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServerAssociationOptions {
    /// the AE title of this node, checked against the called AE title
    /// unless `promiscuous` is set
    ae_title: Cow<'static, str>,
    /// whether to accept any called AE title
    promiscuous: bool,
    /// the application context name expected from requestors
    application_context_name: Cow<'static, str>,
    /// the list of abstract syntaxes this node is willing to support
    abstract_syntax_uids: Vec<Cow<'static, str>>,
    /// the list of transfer syntaxes this node is willing to support
    transfer_syntax_uids: Vec<Cow<'static, str>>,
    /// the maximum PDU length
    max_pdu_length: u32,
}

impl Default for ServerAssociationOptions {
    fn default() -> Self {
        ServerAssociationOptions {
            ae_title: "ANY-SCP".into(),
            promiscuous: false,
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            max_pdu_length: crate::pdu::reader::DEFAULT_MAX_PDU,
        }
    }
}

impl ServerAssociationOptions {
    /// Create a new set of options for accepting an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the AE title of this node.
    ///
    /// By default, incoming requests are rejected unless their
    /// called AE title matches this value;
    /// see [`promiscuous`](ServerAssociationOptions::promiscuous)
    /// to disable this check.
    pub fn ae_title<T>(mut self, ae_title: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.ae_title = ae_title.into();
        self
    }

    /// Accept associations regardless of the called AE title.
    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    /// Include this abstract syntax among those this node is
    /// willing to support.
    pub fn with_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.abstract_syntax_uids.push(abstract_syntax_uid.into());
        self
    }

    /// Include this transfer syntax among those this node is
    /// willing to support.
    pub fn with_transfer_syntax<T>(mut self, transfer_syntax_uid: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.transfer_syntax_uids.push(transfer_syntax_uid.into());
        self
    }

    /// Override the maximum expected PDU length.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Receive an A-ASSOCIATE-RQ from the given stream,
    /// negotiate presentation contexts among the ones
    /// proposed and the ones supported by this node,
    /// and accept or reject the association.
    pub fn establish(self, mut socket: TcpStream) -> Result<ServerAssociation> {
        let ServerAssociationOptions {
            ae_title,
            promiscuous,
            application_context_name,
            abstract_syntax_uids,
            transfer_syntax_uids,
            max_pdu_length,
        } = self;

        let msg = read_pdu(&mut socket, max_pdu_length, true).context(ReceiveRequestSnafu)?;

        let request = match msg {
            Pdu::AssociationRQ(request) => request,
            pdu => return UnexpectedRequestSnafu { pdu }.fail(),
        };

        if !promiscuous && request.called_ae_title.trim() != ae_title.as_ref() {
            let rj = Pdu::AssociationRJ(AssociationRJ {
                result: AssociationRJResult::Permanent,
                source: AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CalledAETitleNotRecognized,
                ),
            });
            write_pdu(&mut socket, &rj).context(SendResponseSnafu)?;
            return AeTitleMismatchSnafu.fail();
        }

        let accepted_abstract_syntaxes: HashSet<&str> = abstract_syntax_uids
            .iter()
            .map(|uid| uid.as_ref())
            .collect();

        let mut results = Vec::with_capacity(request.presentation_contexts.len());
        for pc in &request.presentation_contexts {
            let not_supported_reason =
                if !accepted_abstract_syntaxes.contains(pc.abstract_syntax.as_str()) {
                    PresentationContextResultReason::AbstractSyntaxNotSupported
                } else {
                    PresentationContextResultReason::TransferSyntaxesNotSupported
                };

            let chosen_transfer_syntax = if not_supported_reason
                == PresentationContextResultReason::TransferSyntaxesNotSupported
            {
                choose_supported(
                    pc.transfer_syntaxes
                        .iter()
                        .filter(|ts| transfer_syntax_uids.iter().any(|t| t.as_ref() == ts.as_str())),
                )
                .cloned()
            } else {
                None
            };

            let (reason, transfer_syntax) = match chosen_transfer_syntax {
                Some(ts) => (PresentationContextResultReason::Acceptance, ts),
                None => (not_supported_reason, String::new()),
            };

            results.push(PresentationContextResult {
                id: pc.id,
                reason,
                transfer_syntax,
            });
        }

        ensure!(
            results
                .iter()
                .any(|r| r.reason == PresentationContextResultReason::Acceptance),
            NoAcceptedPresentationContextsSnafu
        );

        let ac = Pdu::AssociationAC(AssociationAC {
            protocol_version: request.protocol_version,
            calling_ae_title: request.calling_ae_title.clone(),
            called_ae_title: request.called_ae_title.clone(),
            application_context_name: application_context_name.to_string(),
            presentation_contexts: results.clone(),
            user_variables: vec![UserVariableItem::MaxLength(max_pdu_length)],
        });

        write_pdu(&mut socket, &ac).context(SendResponseSnafu)?;

        let presentation_contexts = results
            .into_iter()
            .filter(|r| r.reason == PresentationContextResultReason::Acceptance)
            .map(|r| {
                let abstract_syntax = request
                    .presentation_contexts
                    .iter()
                    .find(|pc| pc.id == r.id)
                    .map(|pc| pc.abstract_syntax.clone())
                    .unwrap_or_default();
                NegotiatedPresentationContext {
                    id: r.id,
                    abstract_syntax_uid: abstract_syntax,
                    transfer_syntax_uid: r.transfer_syntax,
                }
            })
            .collect();

        Ok(ServerAssociation {
            calling_ae_title: request.calling_ae_title,
            presentation_contexts,
            max_pdu_length,
            socket,
        })
    }

    /// Bind to the given address and accept a single incoming
    /// association, negotiating it as per [`establish`](Self::establish).
    pub fn listen<A: ToSocketAddrs>(self, address: A) -> Result<ServerAssociation> {
        let listener = TcpListener::bind(address).context(BindSnafu)?;
        let (socket, _addr) = listener.accept().context(AcceptSnafu)?;
        self.establish(socket)
    }
}

/// A presentation context negotiated and accepted as part of
/// an established association.
#[derive(Debug, Clone)]
pub struct NegotiatedPresentationContext {
    /// the identifier of the accorded presentation context
    pub id: u8,
    /// the accorded abstract syntax UID
    pub abstract_syntax_uid: String,
    /// the accorded transfer syntax UID
    pub transfer_syntax_uid: String,
}

/// A DICOM upper level association from the perspective
/// of an association acceptor.
#[derive(Debug)]
pub struct ServerAssociation {
    /// The calling AE title reported by the requestor
    calling_ae_title: String,
    /// The presentation contexts accepted during negotiation
    presentation_contexts: Vec<NegotiatedPresentationContext>,
    /// The maximum PDU length
    max_pdu_length: u32,
    /// The TCP stream to the other DICOM node
    socket: TcpStream,
}

impl ServerAssociation {
    /// Retrieve the calling AE title reported by the requestor.
    pub fn calling_ae_title(&self) -> &str {
        &self.calling_ae_title
    }

    /// Retrieve the presentation contexts accepted during negotiation.
    pub fn presentation_contexts(&self) -> &[NegotiatedPresentationContext] {
        &self.presentation_contexts
    }

    /// Send a PDU message to the other intervenient.
    pub fn send(&mut self, msg: &Pdu) -> Result<()> {
        write_pdu(&mut self.socket, msg).context(SendSnafu)
    }

    /// Read a PDU message from the other intervenient.
    pub fn receive(&mut self) -> Result<Pdu> {
        read_pdu(&mut self.socket, self.max_pdu_length, true).context(ReceiveSnafu)
    }

    /// Gracefully release the association,
    /// in response to an A-RELEASE-RQ from the requestor.
    pub fn release(&mut self) -> Result<()> {
        let pdu = self.receive()?;
        match pdu {
            Pdu::ReleaseRQ => {
                write_pdu(&mut self.socket, &Pdu::ReleaseRP).context(SendSnafu)?;
                let _ = self.socket.shutdown(std::net::Shutdown::Both);
                Ok(())
            }
            pdu => UnexpectedRequestSnafu { pdu }.fail(),
        }
    }

    /// Abort the association, sending an A-ABORT PDU to the other node.
    pub fn abort(&mut self, source: crate::pdu::AbortRQSource) -> Result<()> {
        write_pdu(&mut self.socket, &Pdu::AbortRQ { source }).context(SendSnafu)?;
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        Ok(())
    }
}
