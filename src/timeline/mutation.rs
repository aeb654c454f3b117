use tracing::{debug, warn};

use super::{EngineError, FeedState, LikeRef};

/// Stand-in like reference used between the optimistic update and the
/// service returning the real record URI.
pub const PLACEHOLDER_LIKE_REF: &str = "pending-like";

pub const MUTATION_FAILED_MESSAGE: &str = "Failed to like/unlike post";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    Like { uri: String, cid: String },
    Unlike { uri: String, like_ref: LikeRef },
}

impl MutationRequest {
    pub fn uri(&self) -> &str {
        match self {
            MutationRequest::Like { uri, .. } | MutationRequest::Unlike { uri, .. } => uri,
        }
    }
}

#[derive(Debug)]
pub enum MutationOutcome {
    Liked {
        uri: String,
        result: anyhow::Result<LikeRef>,
    },
    Unliked {
        uri: String,
        result: anyhow::Result<()>,
    },
}

/// Works out which remote call toggles the like on `uri`. Nothing is changed
/// locally yet; the caller starts the remote call and then applies
/// [`apply_optimistic`].
pub fn plan_toggle_like(state: &FeedState, uri: &str) -> Option<MutationRequest> {
    let item = state.get(uri)?;
    let request = match item.viewer.like.as_ref() {
        Some(like_ref) => MutationRequest::Unlike {
            uri: item.uri.clone(),
            like_ref: like_ref.clone(),
        },
        None => MutationRequest::Like {
            uri: item.uri.clone(),
            cid: item.cid.clone(),
        },
    };
    Some(request)
}

pub fn apply_optimistic(state: &mut FeedState, request: &MutationRequest) {
    let applied = match request {
        MutationRequest::Like { uri, .. } => state.update_item(uri, |item| {
            item.viewer.like = Some(PLACEHOLDER_LIKE_REF.to_string());
            item.like_count = item.like_count.saturating_add(1);
        }),
        MutationRequest::Unlike { uri, .. } => state.update_item(uri, |item| {
            item.viewer.like = None;
            item.like_count = item.like_count.saturating_sub(1);
        }),
    };
    debug!(uri = request.uri(), applied, "optimistic like toggle");
}

/// Settles a finished remote call. Failures are reported but the optimistic
/// change stays in place until the next refresh reconciles it.
pub fn complete(state: &mut FeedState, outcome: MutationOutcome) {
    match outcome {
        MutationOutcome::Liked {
            uri,
            result: Ok(like_ref),
        } => {
            state.update_item(&uri, |item| {
                if item.viewer.like.as_deref() == Some(PLACEHOLDER_LIKE_REF) {
                    item.viewer.like = Some(like_ref);
                }
            });
            state.error = None;
        }
        MutationOutcome::Unliked { result: Ok(()), .. } => {
            state.error = None;
        }
        MutationOutcome::Liked {
            uri,
            result: Err(err),
        }
        | MutationOutcome::Unliked {
            uri,
            result: Err(err),
        } => {
            warn!(uri = %uri, error = %format!("{err:#}"), "like toggle failed");
            state.error = Some(EngineError::Mutation(MUTATION_FAILED_MESSAGE.to_string()));
        }
    }
}
