//! Connection dispatch macro for reducing code duplication.
//!
//! Most handle operations run on the handle's own connection when it is open
//! and on a short-lived one otherwise. [`with_connection!`] expands both
//! paths around a single body so each operation reads linearly.

/// Run `$body` with `$conn: &mut dyn PhysicalConnection`.
///
/// `$handle` must expose `connection: Option<Box<dyn PhysicalConnection>>`,
/// `driver: Arc<dyn NativeDriver>` and `connection_string: String`. When no
/// connection is held, an ephemeral one is opened for the body and closed
/// again whether or not the body succeeded. The body evaluates to a
/// `DbResult`; do not use `?` inside it, or the ephemeral connection leaks
/// until drop.
///
/// # Example
///
/// ```ignore
/// with_connection!(self, |conn| metadata.columns(conn, table).await)
/// ```
macro_rules! with_connection {
    ($handle:expr, |$conn:ident| $body:expr) => {{
        match $handle.connection.as_deref_mut() {
            Some($conn) => $body,
            None => {
                let mut ephemeral = $handle.driver.open(&$handle.connection_string).await?;
                let result = {
                    let $conn: &mut dyn $crate::db::driver::PhysicalConnection = ephemeral.as_mut();
                    $body
                };
                $crate::db::driver::close_quietly(ephemeral).await;
                result
            }
        }
    }};
}

pub(crate) use with_connection;
