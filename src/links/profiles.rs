use super::{missing_identity, LinkContext};
use crate::config::LinkSettings;
use crate::error::Result;
use crate::promql::LabelMatcher;
use crate::sources::BackendKind;
use url::Url;

/// Parca icicle view merged over the window
pub(super) fn build(mut base: Url, ctx: &LinkContext<'_>, settings: &LinkSettings) -> Result<Url> {
    let mut matchers = ctx.identity_matchers();
    if let Some(id) = ctx.pivot_id() {
        matchers.push(LabelMatcher::equal(settings.profile_trace_label.clone(), id).to_string());
    }
    if matchers.is_empty() {
        return Err(missing_identity(BackendKind::Profiles));
    }

    let expression = format!("{}{{{}}}", settings.profile_type, matchers.join(","));
    base.query_pairs_mut()
        .append_pair("currentProfileView", "icicle")
        .append_pair("expression_a", &expression)
        .append_pair("from_a", &ctx.window.start.timestamp_millis().to_string())
        .append_pair("to_a", &ctx.window.end.timestamp_millis().to_string())
        .append_pair("merge_a", "true");
    Ok(base)
}
