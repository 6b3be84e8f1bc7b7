//! Per-provider response normalization.
//!
//! Each callback provider reports delivery outcomes in its own vocabulary;
//! the mapping tables here translate a raw `(status, detail_code)` pair into
//! the canonical [`NotificationStatus`] plus an optional human-readable
//! reason. The tables are total over the statuses each provider documents:
//! anything else is an explicit [`ResponseNotFound`] error, never a silent
//! default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::NotificationStatus;

/// The providers that deliver asynchronous callbacks to this service.
///
/// Email has no callback channel in this deployment; the mailer client ends
/// the email lifecycle at `sending`, so it does not appear here. Adding a
/// provider means adding a variant and its mapping table — an unknown
/// provider name is a deployment error caught when the callback task is
/// deserialized, not something the normalizer can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackProvider {
    Spryng,
    Messagebox,
    Dvla,
}

impl CallbackProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spryng => "spryng",
            Self::Messagebox => "messagebox",
            Self::Dvla => "dvla",
        }
    }

    /// Name used in operator-facing log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Spryng => "Spryng",
            Self::Messagebox => "Messagebox",
            Self::Dvla => "DVLA",
        }
    }
}

impl std::fmt::Display for CallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw provider status translated into the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResponse {
    pub status: NotificationStatus,
    pub reason: Option<&'static str>,
}

/// The provider reported a status absent from its mapping table.
#[derive(Debug, Clone, Error)]
#[error("{} callback failed: status {raw_status} not found", .provider.display_name())]
pub struct ResponseNotFound {
    pub provider: CallbackProvider,
    pub raw_status: String,
}

/// Translate a provider's raw `(status, detail_code)` pair.
///
/// Pure lookup over static tables. Unknown detail codes yield a `None`
/// reason; unknown raw statuses are an error.
pub fn normalize(
    provider: CallbackProvider,
    raw_status: &str,
    detail_code: Option<&str>,
) -> Result<NormalizedResponse, ResponseNotFound> {
    let mapped = match provider {
        CallbackProvider::Spryng => spryng_response(raw_status, detail_code),
        CallbackProvider::Messagebox => messagebox_response(raw_status, detail_code),
        CallbackProvider::Dvla => dvla_response(raw_status, detail_code),
    };

    mapped.ok_or_else(|| ResponseNotFound {
        provider,
        raw_status: raw_status.to_string(),
    })
}

fn spryng_response(raw_status: &str, detail_code: Option<&str>) -> Option<NormalizedResponse> {
    match raw_status {
        "10" => Some(NormalizedResponse {
            status: NotificationStatus::Delivered,
            reason: match detail_code {
                Some("0") => Some("No error"),
                _ => None,
            },
        }),
        "20" => Some(NormalizedResponse {
            status: NotificationStatus::PermanentFailure,
            reason: match detail_code {
                Some("20") => Some("Recipient number unreachable"),
                Some("21") => Some("Recipient number incorrect"),
                Some("22") => Some("Delivery failure"),
                Some("31") => Some("The recipient is blacklisted"),
                Some("32") => Some("The originator is not registered for this country"),
                _ => None,
            },
        }),
        _ => None,
    }
}

fn messagebox_response(raw_status: &str, detail_code: Option<&str>) -> Option<NormalizedResponse> {
    match raw_status {
        "10" => Some(NormalizedResponse {
            status: NotificationStatus::Delivered,
            reason: match detail_code {
                Some("0") => Some("No error"),
                _ => None,
            },
        }),
        "20" => Some(NormalizedResponse {
            status: NotificationStatus::PermanentFailure,
            reason: match detail_code {
                Some("TechnischProbleem") => Some("Technisch probleem bij verwerken"),
                Some("NietActiefOfGeabonneerd") => {
                    Some("Geen actieve berichtenbox of geen abonnement")
                }
                Some("BerichtTypeNietOndersteund") => {
                    Some("Bericht type bestaat niet of is niet actief")
                }
                Some("AanmaakDatumLigtTeVerInHetVerleden") => {
                    Some("Aanmaakdatum te ver in het verleden")
                }
                Some("PublicatieDatumLigtTeVerInDeToekomst") => {
                    Some("Publicatiedatum te ver in de toekomst")
                }
                Some("BerichtBestaatAl") => {
                    Some("Een bericht met hetzelfde berichtID is reeds aangeboden")
                }
                Some("BijlageTeGroot") => {
                    Some("De omvang van de persoonlijke bijlage(n) in het bericht is te groot")
                }
                Some("OinInCPAKomtNietOvereenMetOinInBericht") => {
                    Some("OIN uit CPA komt niet overeen met OID in het bericht")
                }
                Some("XmlValidatieTegenXsdValtNegatiefUit") => {
                    Some("Bericht xml valideert niet tegen XSD")
                }
                Some("ValidatieBerichtType") => Some("Niet gelukt om bericht type te valideren"),
                Some("ValidatieGebruiker") => Some("Niet gelukt om de burger te valideren"),
                Some("StoreMessage") => Some("Niet gelukt om bericht op te slaan"),
                _ => None,
            },
        }),
        _ => None,
    }
}

fn dvla_response(raw_status: &str, detail_code: Option<&str>) -> Option<NormalizedResponse> {
    match raw_status {
        "ACCEPTED" => Some(NormalizedResponse {
            status: NotificationStatus::Pending,
            reason: None,
        }),
        "DESPATCHED" => Some(NormalizedResponse {
            status: NotificationStatus::Delivered,
            reason: match detail_code {
                Some("0") => Some("No error"),
                _ => None,
            },
        }),
        "REJECTED" => Some(NormalizedResponse {
            status: NotificationStatus::PermanentFailure,
            reason: match detail_code {
                Some("PRINT_FILE_INVALID") => Some("Print file failed validation"),
                Some("ADDRESS_UNREADABLE") => Some("Recipient address could not be read"),
                Some("JOB_EXPIRED") => Some("Print job expired before despatch"),
                _ => None,
            },
        }),
        "CANCELLED" => Some(NormalizedResponse {
            status: NotificationStatus::PermanentFailure,
            reason: match detail_code {
                Some("CANCELLED_BY_REQUEST") => Some("Print job cancelled by request"),
                _ => None,
            },
        }),
        _ => None,
    }
}
