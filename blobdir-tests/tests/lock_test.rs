// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use blobdir_client::lock::Lock;
use blobdir_store::object::{ObjectStore, StoreOp};
use blobdir_tests::Testing;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LOCK: &str = "write.lock";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutual_exclusion() {
    let testing = Arc::new(Testing::default());
    let participants = 10;
    let cycles = 5;

    let holders = Arc::new(AtomicUsize::new(0));
    let acquired = Arc::new(AtomicUsize::new(0));
    let mut tasks = vec![];

    for _ in 0..participants {
        let dir = testing.memory_dir().unwrap();
        let holders = holders.clone();
        let acquired = acquired.clone();

        tasks.push(tokio::spawn(async move {
            let lock = dir.make_lock(LOCK);
            for _ in 0..cycles {
                while !lock.obtain().await.unwrap() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }

                assert_eq!(holders.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                assert_eq!(holders.fetch_sub(1, Ordering::SeqCst), 1);
                acquired.fetch_add(1, Ordering::SeqCst);

                lock.release().await.unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(acquired.load(Ordering::SeqCst), participants * cycles);
    assert!(!testing.store.is_leased(LOCK));
}

#[tokio::test]
async fn release_is_idempotent() {
    let testing = Testing::default();
    let dir = testing.memory_dir().unwrap();
    let lock = dir.make_lock(LOCK);

    lock.release().await.unwrap();
    assert!(lock.obtain().await.unwrap());
    // A second obtain on the holding instance is still true.
    assert!(lock.obtain().await.unwrap());
    lock.release().await.unwrap();
    lock.release().await.unwrap();
    assert!(!lock.is_locked().await.unwrap());
    assert_eq!(dir.metrics().lock_obtained.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn lease_is_renewed_while_held() {
    let testing = Testing::default();
    let holder_dir = testing.memory_dir().unwrap();
    let other_dir = testing.memory_dir().unwrap();
    let holder = holder_dir.make_lock(LOCK);
    let other = other_dir.make_lock(LOCK);

    assert!(!other.is_locked().await.unwrap());
    assert!(holder.obtain().await.unwrap());

    // Well past the 60s lease window.
    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(holder.is_held().await);
    assert!(other.is_locked().await.unwrap());
    assert!(!other.obtain().await.unwrap());
    assert_eq!(other_dir.metrics().lock_conflicts.get(), 1);

    holder.release().await.unwrap();
    assert!(!other.is_locked().await.unwrap());
    assert!(other.obtain().await.unwrap());
    other.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn renewal_failure_marks_lock_lost() {
    let testing = Testing::default();
    let holder_dir = testing.memory_dir().unwrap();
    let other_dir = testing.memory_dir().unwrap();
    let holder = holder_dir.make_lock(LOCK);
    let other = other_dir.make_lock(LOCK);

    assert!(holder.obtain().await.unwrap());
    testing.store.inject_failure(StoreOp::Lease, 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!holder.is_held().await);
    assert_eq!(holder_dir.metrics().lease_renew_failures.get(), 1);

    // The old lease has not run out yet.
    assert!(!other.obtain().await.unwrap());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(other.obtain().await.unwrap());
    assert!(!holder.obtain().await.unwrap());
    other.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn broken_lock_can_be_obtained_again() {
    let testing = Testing::default();
    let holder_dir = testing.memory_dir().unwrap();
    let admin_dir = testing.memory_dir().unwrap();
    let holder = holder_dir.make_lock(LOCK);

    assert!(holder.obtain().await.unwrap());
    admin_dir.clear_lock(LOCK).await.unwrap();
    assert!(!testing.store.exists(LOCK).await.unwrap());

    // The next renewal finds the marker gone.
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!holder.is_held().await);

    assert!(holder.obtain().await.unwrap());
    assert!(testing.store.is_leased(LOCK));
    holder.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn obtain_with_timeout() {
    let testing = Testing::default();
    let holder_dir = testing.memory_dir().unwrap();
    let waiter_dir = testing.memory_dir().unwrap();
    let holder = holder_dir.make_lock(LOCK);
    let waiter = waiter_dir.make_lock(LOCK);

    assert!(holder.obtain().await.unwrap());
    let err = waiter
        .obtain_timeout(Duration::from_secs(5), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, blobdir_common::error::FsError::Timeout(_)));

    let release = {
        let holder = holder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            holder.release().await.unwrap();
        })
    };

    assert!(waiter
        .obtain_timeout(Duration::from_secs(10), Duration::from_secs(1))
        .await
        .unwrap());
    release.await.unwrap();
    waiter.release().await.unwrap();
}

#[tokio::test]
async fn custom_lease_timing() {
    let testing = Testing::default().with_lock("10s", "2s").unwrap();
    assert_eq!(testing.conf.lock.lease_duration, Duration::from_secs(10));
    assert!(Testing::default().with_lock("10s", "10s").is_err());
}

#[tokio::test(start_paused = true)]
async fn no_renewal_after_release() {
    let testing = Testing::default();
    let dir = testing.memory_dir().unwrap();
    let lock = dir.make_lock(LOCK);

    for _ in 0..3 {
        assert!(lock.obtain().await.unwrap());
        tokio::time::sleep(Duration::from_secs(29)).await;
        lock.release().await.unwrap();
    }
    assert_eq!(testing.store.renew_count(), 0);

    // Renewed at 30s and 60s, then released.
    assert!(lock.obtain().await.unwrap());
    tokio::time::sleep(Duration::from_secs(65)).await;
    lock.release().await.unwrap();
    assert_eq!(testing.store.renew_count(), 2);

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(testing.store.renew_count(), 2);
    assert_eq!(dir.metrics().lease_renew_failures.get(), 0);
    assert!(!testing.store.is_leased(LOCK));
}
