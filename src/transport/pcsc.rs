//! PC/SC reader transport.
//!
//! This module drives contactless readers (ACR122U and compatibles) through the platform
//! PC/SC service. PC/SC calls block, so each one runs on the blocking thread pool.

use std::ffi::CString;

use futures::future::BoxFuture;
use pcsc::{Context, Disposition, MAX_BUFFER_SIZE, Protocols, Scope, ShareMode};

use crate::error::{Error, Result};
use crate::protocol::ApduResponse;
use crate::transport::ReaderTransport;
use crate::types::ReaderHandle;

/// PC/SC transport.
///
/// Holds only the service context; every transaction connects to the tag, transmits and
/// disconnects again, leaving the card powered.
#[derive(Clone)]
pub struct PcscTransport {
    context: Context,
}

impl PcscTransport {
    /// Establishes a user-scope PC/SC context.
    ///
    /// # Errors
    ///
    /// Returns an error if the PC/SC service is unavailable.
    pub fn establish() -> Result<Self> {
        let context = Context::establish(Scope::User)?;
        tracing::info!("established PC/SC context");
        Ok(Self { context })
    }
}

fn list_blocking(context: &Context) -> Result<Vec<ReaderHandle>> {
    let len = match context.list_readers_len() {
        Ok(len) => len,
        Err(pcsc::Error::NoReadersAvailable) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut buf = vec![0u8; len];
    match context.list_readers(&mut buf) {
        Ok(names) => Ok(names
            .map(|name| ReaderHandle::new(name.to_string_lossy().into_owned()))
            .collect()),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn transmit_blocking(context: &Context, reader: &str, command: &[u8]) -> Result<ApduResponse> {
    let name = CString::new(reader).map_err(|_| Error::Transport {
        message: format!("invalid reader name {reader:?}"),
    })?;

    let card = context.connect(&name, ShareMode::Shared, Protocols::ANY)?;

    let mut buf = [0u8; MAX_BUFFER_SIZE];
    let result = card.transmit(command, &mut buf).map(<[u8]>::to_vec);

    if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
        tracing::warn!("failed to disconnect from {}: {}", reader, e);
    }

    let raw = result?;
    tracing::trace!("transmit {} -> {}", hex::encode(command), hex::encode(&raw));
    Ok(ApduResponse::from_raw(&raw)?)
}

fn join_error(e: &tokio::task::JoinError) -> Error {
    Error::Transport {
        message: format!("PC/SC worker failed: {e}"),
    }
}

impl ReaderTransport for PcscTransport {
    fn list_readers(&self) -> BoxFuture<'_, Result<Vec<ReaderHandle>>> {
        let context = self.context.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || list_blocking(&context))
                .await
                .map_err(|e| join_error(&e))?
        })
    }

    fn transmit<'a>(
        &'a self,
        reader: &'a ReaderHandle,
        command: &'a [u8],
    ) -> BoxFuture<'a, Result<ApduResponse>> {
        let context = self.context.clone();
        let reader = reader.name().to_owned();
        let command = command.to_vec();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || transmit_blocking(&context, &reader, &command))
                .await
                .map_err(|e| join_error(&e))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires a running PC/SC service"]
    async fn test_list_readers() {
        let transport = PcscTransport::establish().unwrap();
        // No attached readers is an empty list, not an error.
        let readers = transport.list_readers().await.unwrap();
        for reader in &readers {
            assert!(!reader.name().is_empty());
        }
    }
}
