// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::storage::error::{StorageError, StorageResult};

/// Fail with `Canceled` if the token has already fired.
///
/// Backends whose operations cannot be interrupted once started call this
/// exactly once, before dispatch.
pub fn ensure_active(cancel: &CancellationToken) -> StorageResult<()> {
    if cancel.is_cancelled() {
        Err(StorageError::Canceled)
    } else {
        Ok(())
    }
}

/// Run `operation` until it finishes or the token fires, whichever is first.
///
/// When the token wins, the operation future is dropped, which aborts any
/// request it had in flight.
pub async fn run_cancellable<F, T, E>(cancel: &CancellationToken, operation: F) -> StorageResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StorageError>,
{
    ensure_active(cancel)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Canceled),
        result = operation => result.map_err(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_ensure_active() {
        let token = CancellationToken::new();
        assert!(ensure_active(&token).is_ok());
        token.cancel();
        assert!(matches!(ensure_active(&token), Err(StorageError::Canceled)));
    }

    #[tokio::test]
    async fn test_run_cancellable_completes() {
        let token = CancellationToken::new();
        let result = run_cancellable(&token, async { Ok::<_, StorageError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_cancellable_converts_errors() {
        let token = CancellationToken::new();
        let result: StorageResult<()> = run_cancellable(&token, async {
            Err(std::io::Error::other("disk on fire"))
        })
        .await;
        assert!(matches!(result, Err(StorageError::IoError(_))));
    }

    #[tokio::test]
    async fn test_run_cancellable_pre_cancelled_never_polls() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = AtomicBool::new(false);
        let result: StorageResult<()> = run_cancellable(&token, async {
            polled.store(true, Ordering::SeqCst);
            Ok::<_, StorageError>(())
        })
        .await;
        assert!(matches!(result, Err(StorageError::Canceled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_cancellable_interrupts_in_flight() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            child.cancel();
        });

        let result: StorageResult<()> = run_cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, StorageError>(())
        })
        .await;
        assert!(matches!(result, Err(StorageError::Canceled)));
    }
}
