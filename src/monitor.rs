//! Hybrid Response Monitor (C9): portal probe + mailbox probe + thread probe,
//! fused into a single authoritative status transition.

use std::sync::Arc;

use chrono::Utc;

use crate::browser::{BrowserAutomationClient, PortalStatus};
use crate::classifier::{self, Category, TRANSITION_CONFIDENCE_GATE};
use crate::error::ApiError;
use crate::lifecycle::LifecycleController;
use crate::llm::LlmGateway;
use crate::mail::MailGateway;
use crate::models::{Application, ApplicationStatus, CommunicationDirection};

/// The abstract signal vocabulary fusion picks from, ordered highest to
/// lowest precedence (top-to-bottom in `PRECEDENCE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Rejected,
    Offer,
    Interview,
    InReview,
    Applied,
}

const PRECEDENCE: [Signal; 5] = [
    Signal::Rejected,
    Signal::Offer,
    Signal::Interview,
    Signal::InReview,
    Signal::Applied,
];

impl Signal {
    fn target_status(self) -> ApplicationStatus {
        match self {
            Signal::Rejected => ApplicationStatus::Rejected,
            Signal::Offer => ApplicationStatus::OfferReceived,
            Signal::Interview => ApplicationStatus::InterviewScheduled,
            Signal::InReview => ApplicationStatus::UnderReview,
            Signal::Applied => ApplicationStatus::Applied,
        }
    }
}

struct Found {
    signal: Signal,
    confidence: f64,
    description: String,
}

pub struct ResponseMonitor {
    lifecycle: Arc<LifecycleController>,
}

impl ResponseMonitor {
    pub fn new(lifecycle: Arc<LifecycleController>) -> Self {
        Self { lifecycle }
    }

    /// `Probe(application)`. `use_llm` governs whether the classifier is
    /// allowed to fall back to an LLM pass on low-confidence matches.
    pub async fn probe(
        &self,
        application_id: uuid::Uuid,
        browser: Option<&dyn BrowserAutomationClient>,
        mail: Option<&dyn MailGateway>,
        llm: Option<&dyn LlmGateway>,
        use_llm: bool,
    ) -> Result<Application, ApiError> {
        let lock = self.lifecycle.lock_for(application_id);
        let _guard = lock.lock().await;

        let application = self.lifecycle.get(application_id).await?;
        if application.status.is_terminal() {
            return Ok(application);
        }

        let mut signals = Vec::new();

        if let (Some(browser), Some(application_url)) =
            (browser, application.application_url.as_deref())
        {
            if let Ok(status) = browser.check_status(application_url).await {
                if let Some(signal) = portal_signal(status.status) {
                    signals.push(Found {
                        signal,
                        confidence: 1.0,
                        description: "portal probe".to_string(),
                    });
                }
            }
        }

        if let Some(mail) = mail {
            let domain = application
                .application_domain
                .clone()
                .or_else(|| application.recipient_email.as_deref().and_then(domain_of));

            if let Some(domain) = domain {
                let search_window = application.applied_date.unwrap_or_else(|| Utc::now() - chrono::Duration::days(30));
                let query = format!("from:({domain}) after:{}", search_window.format("%Y/%m/%d"));

                if let Ok(messages) = mail.list(&query).await {
                    for summary in messages {
                        if let Ok(detail) = mail.fetch(&summary.provider_message_id).await {
                            if let Some(sent_at) = application.last_email_sent_at {
                                if detail.internal_date <= sent_at {
                                    continue;
                                }
                            }
                            let analysis = classifier::analyze(llm, &detail.subject, &detail.body_text, use_llm).await;
                            self.lifecycle
                                .add_communication(
                                    application.id,
                                    CommunicationDirection::Inbound,
                                    "email",
                                    Some(detail.subject.clone()),
                                    Some(detail.snippet.clone()),
                                    Some(detail.provider_message_id.clone()),
                                    Some(format!("{:?}", analysis.category)),
                                    Some(analysis.confidence),
                                )
                                .await?;

                            if analysis.requires_action || analysis.category != Category::Unknown {
                                if let Some(signal) = classifier_signal(analysis.category, application.status) {
                                    signals.push(Found {
                                        signal,
                                        confidence: analysis.confidence,
                                        description: format!("mailbox probe: {:?}", analysis.category),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        if let (Some(mail), Some(thread_id)) = (mail, application.email_thread_id.clone()) {
            if let Ok(messages) = mail.list(&format!("in:{thread_id}")).await {
                for summary in messages {
                    if summary.thread_id != thread_id {
                        continue;
                    }
                    if let Ok(detail) = mail.fetch(&summary.provider_message_id).await {
                        if let Some(sent_at) = application.last_email_sent_at {
                            if detail.internal_date <= sent_at {
                                continue;
                            }
                        }
                        let analysis = classifier::analyze(llm, &detail.subject, &detail.body_text, use_llm).await;
                        if let Some(signal) = classifier_signal(analysis.category, application.status) {
                            signals.push(Found {
                                signal,
                                confidence: analysis.confidence,
                                description: format!("thread probe: {:?}", analysis.category),
                            });
                        }
                    }
                }
            }
        }

        self.lifecycle.applications().record_response_check(application.id).await?;

        if let Some(winner) = fuse(signals) {
            if winner.confidence >= TRANSITION_CONFIDENCE_GATE {
                return self
                    .lifecycle
                    .transition(application.id, winner.signal.target_status(), &winner.description)
                    .await;
            }
        }

        self.lifecycle.get(application.id).await
    }
}

fn portal_signal(status: PortalStatus) -> Option<Signal> {
    match status {
        PortalStatus::Applied => Some(Signal::Applied),
        PortalStatus::InReview => Some(Signal::InReview),
        PortalStatus::Interview => Some(Signal::Interview),
        PortalStatus::Offer => Some(Signal::Offer),
        PortalStatus::Rejected => Some(Signal::Rejected),
        PortalStatus::Unknown => None,
    }
}

/// The classifier→status mapping from the C8 transition table, with the
/// `acknowledgment` special case gated on the application already being in
/// `applied` or `submitted`.
fn classifier_signal(category: Category, current: ApplicationStatus) -> Option<Signal> {
    match category {
        Category::Rejection => Some(Signal::Rejected),
        Category::Offer => Some(Signal::Offer),
        Category::InterviewInvitation => Some(Signal::Interview),
        Category::Acknowledgment
            if matches!(current, ApplicationStatus::Applied | ApplicationStatus::Submitted) =>
        {
            Some(Signal::InReview)
        }
        _ => None,
    }
}

fn fuse(signals: Vec<Found>) -> Option<Found> {
    PRECEDENCE.iter().find_map(|precedence| {
        signals
            .iter()
            .position(|found| found.signal == *precedence)
            .map(|index| signals[index].signal)
            .and_then(|signal| {
                signals
                    .iter()
                    .filter(|f| f.signal == signal)
                    .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
                    .map(|f| Found {
                        signal: f.signal,
                        confidence: f.confidence,
                        description: f.description.clone(),
                    })
            })
    })
}

fn domain_of(email: &str) -> Option<String> {
    email.split('@').nth(1).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_outranks_interview() {
        let signals = vec![
            Found { signal: Signal::Interview, confidence: 0.9, description: String::new() },
            Found { signal: Signal::Rejected, confidence: 0.7, description: String::new() },
        ];
        let winner = fuse(signals).unwrap();
        assert_eq!(winner.signal, Signal::Rejected);
    }

    #[test]
    fn acknowledgment_ignored_outside_applied_or_submitted() {
        assert!(classifier_signal(Category::Acknowledgment, ApplicationStatus::Draft).is_none());
        assert!(classifier_signal(Category::Acknowledgment, ApplicationStatus::Applied).is_some());
    }
}
