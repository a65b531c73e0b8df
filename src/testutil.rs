// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::time::Duration;

use tokio::time::Instant;

/// Wait for the given async predicate to return true or fail. Sleeping between polls lets
/// spawned tasks run on a single-threaded test runtime.
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    let mut tick = Duration::from_millis(1);
    let max_tick = Duration::from_millis(20);
    let timeout = Duration::from_secs(3);

    loop {
        if predicate().await {
            return;
        }
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }

        tokio::time::sleep(tick).await;
        tick = std::cmp::min(tick * 2, max_tick);
    }
}
