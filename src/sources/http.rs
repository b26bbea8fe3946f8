use crate::sources::error::FetchError;
use log::{debug, warn};
use reqwest::Client;

/// Issues a GET for `base` with `params` and returns the request URL and the
/// response body. Timeouts, transport failures and non-success statuses are
/// mapped to distinct [`FetchError`] variants.
pub(crate) async fn get_text<P: serde::Serialize + ?Sized>(
    client: &Client,
    base: &str,
    params: &P,
) -> Result<(String, String), FetchError> {
    let request = client
        .get(base)
        .query(params)
        .build()
        .map_err(|e| FetchError::NetworkRequest(base.to_string(), e))?;
    let url = request.url().to_string();
    debug!("Requesting {}", url);

    let response = client
        .execute(request)
        .await
        .map_err(|e| FetchError::from_request(&url, e))?;

    let response = match response.error_for_status() {
        Ok(resp) => resp,
        Err(e) => {
            warn!("HTTP error for {}: {:?}", url, e);
            return Err(FetchError::from_request(&url, e));
        }
    };

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_request(&url, e))?;
    Ok((url, body))
}
