//! Application service: issue the create request and handle the
//! permission-escalation response.

use anyhow::Result;

use crate::application::ports::{CodespaceLifecycle, UserStream};
use crate::domain::codespace::{Codespace, CreateParams};
use crate::domain::error::{ApiError, CodespaceError};

/// Creates a codespace with exactly one request.
///
/// When the service asks for additional permissions, the instructions are
/// written to `stream` once and [`CodespaceError::Silent`] is returned so the
/// caller does not report the failure again. Every other error is returned
/// unchanged.
///
/// # Errors
///
/// See above.
pub async fn create_codespace(
    api: &impl CodespaceLifecycle,
    stream: &impl UserStream,
    params: &CreateParams,
) -> Result<Codespace> {
    let err = match api.create_codespace(params).await {
        Ok(codespace) => return Ok(codespace),
        Err(err) => err,
    };

    if let Some(ApiError::AcceptPermissionsRequired {
        allow_permissions_url,
    }) = err.downcast_ref::<ApiError>()
    {
        stream.println(&permissions_message(allow_permissions_url));
        return Err(CodespaceError::Silent.into());
    }
    Err(err)
}

/// Instructions shown when creation needs the user's consent.
#[must_use]
pub fn permissions_message(allow_permissions_url: &str) -> String {
    let url = allow_permissions_url
        .strip_prefix("https://")
        .or_else(|| allow_permissions_url.strip_prefix("http://"))
        .unwrap_or(allow_permissions_url);
    format!(
        "You must authorize or deny additional permissions requested by this codespace before continuing.\n\
         Open this URL in your browser to review and authorize additional permissions: {url}\n\
         Alternatively, you can run \"create\" with the \"--default-permissions\" option to continue without authorizing additional permissions."
    )
}
