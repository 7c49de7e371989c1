use std::sync::mpsc::{self, Receiver, Sender};

use updraft_core::AppRelease;

/// Decisions and notices the engine needs from whoever drives it.
pub trait Interaction {
    fn notify(&self, title: &str, message: &str);

    /// Picks the release to install from `candidates`, or `None` to decline.
    fn choose_release(&self, candidates: &[AppRelease], installed: &AppRelease)
        -> Option<AppRelease>;

    fn confirm_discard_stale_delta(&self) -> bool;
}

/// One question sent from the update worker to the interactive thread.
pub enum DecisionRequest {
    Notify {
        title: String,
        message: String,
    },
    ChooseRelease {
        candidates: Vec<AppRelease>,
        installed: AppRelease,
        reply: Sender<Option<AppRelease>>,
    },
    ConfirmDiscard {
        reply: Sender<bool>,
    },
}

impl DecisionRequest {
    /// Answers the request with `ui`. A worker that stopped waiting is ignored.
    pub fn answer(self, ui: &dyn Interaction) {
        match self {
            Self::Notify { title, message } => ui.notify(&title, &message),
            Self::ChooseRelease {
                candidates,
                installed,
                reply,
            } => {
                let _ = reply.send(ui.choose_release(&candidates, &installed));
            }
            Self::ConfirmDiscard { reply } => {
                let _ = reply.send(ui.confirm_discard_stale_delta());
            }
        }
    }
}

/// [`Interaction`] for the worker side: every call is forwarded over a
/// channel and blocks until the interactive side replies. A closed channel
/// reads as "declined".
#[derive(Clone)]
pub struct ChannelInteraction {
    requests: Sender<DecisionRequest>,
}

impl ChannelInteraction {
    fn ask<T>(&self, build: impl FnOnce(Sender<T>) -> DecisionRequest) -> Option<T> {
        let (reply, answer) = mpsc::channel();
        self.requests.send(build(reply)).ok()?;
        answer.recv().ok()
    }
}

impl Interaction for ChannelInteraction {
    fn notify(&self, title: &str, message: &str) {
        let request = DecisionRequest::Notify {
            title: title.to_string(),
            message: message.to_string(),
        };
        if self.requests.send(request).is_err() {
            tracing::warn!("{title}: {message}");
        }
    }

    fn choose_release(
        &self,
        candidates: &[AppRelease],
        installed: &AppRelease,
    ) -> Option<AppRelease> {
        self.ask(|reply| DecisionRequest::ChooseRelease {
            candidates: candidates.to_vec(),
            installed: installed.clone(),
            reply,
        })
        .flatten()
    }

    fn confirm_discard_stale_delta(&self) -> bool {
        self.ask(|reply| DecisionRequest::ConfirmDiscard { reply })
            .unwrap_or(false)
    }
}

pub fn interaction_channel() -> (ChannelInteraction, Receiver<DecisionRequest>) {
    let (requests, incoming) = mpsc::channel();
    (ChannelInteraction { requests }, incoming)
}

/// Answers requests until every [`ChannelInteraction`] is dropped.
pub fn serve_interaction(incoming: &Receiver<DecisionRequest>, ui: &dyn Interaction) {
    for request in incoming.iter() {
        request.answer(ui);
    }
}
