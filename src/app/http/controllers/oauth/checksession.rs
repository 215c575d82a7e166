use axum::response::Html;

/// OpenID Connect Session Management's check-session iframe. Real
/// session-state comparison needs the IdP's own cookie, which this
/// crate does not manage (spec §1 "user-device UI"); this stub always
/// reports `changed` so an embedding RP never trusts a false "unchanged".
pub async fn show() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html><html><body><script>
window.addEventListener("message", function (event) {
    event.source.postMessage("changed", event.origin);
});
</script></body></html>"#,
    )
}
