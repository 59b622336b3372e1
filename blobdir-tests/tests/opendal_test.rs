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
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::state::CACHED_LENGTH;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use blobdir_tests::Testing;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LOCK: &str = "write.lock";

async fn write<W: Writer>(mut writer: W, data: &[u8]) {
    writer.write(data).await.unwrap();
    writer.complete().await.unwrap();
}

#[tokio::test]
async fn write_close_read_across_processes() {
    let testing = Testing::default();
    let p1 = testing.opendal_dir().unwrap();
    let p2 = testing.opendal_dir().unwrap();

    write(p1.create_output("segments_1").await.unwrap(), b"generation-1").await;
    let meta = testing.opendal.get_metadata("segments_1").await.unwrap();
    assert_eq!(meta.get(CACHED_LENGTH).map(|x| x.as_str()), Some("12"));
    assert_eq!(p1.list_all().await.unwrap(), vec!["segments_1"]);

    let mut reader = p2.open_input("segments_1").await.unwrap();
    assert_eq!(reader.read_all().await.unwrap(), b"generation-1");
    assert_eq!(
        p2.cache().length("segments_1").await.unwrap(),
        testing.opendal.get_length("segments_1").await.unwrap()
    );
    assert_eq!(p2.metrics().cache_refreshes.get(), 1);

    // A longer replacement from the other process is downloaded again.
    write(
        p1.create_output("segments_1").await.unwrap(),
        b"generation-10",
    )
    .await;
    let mut reader = p2.open_input("segments_1").await.unwrap();
    assert_eq!(reader.read_all().await.unwrap(), b"generation-10");
    assert_eq!(p2.metrics().cache_refreshes.get(), 2);

    p1.delete_file("segments_1").await.unwrap();
    assert!(p2.open_input("segments_1").await.unwrap_err().is_not_found());
    assert!(!p2.cache().exists("segments_1").await.unwrap());
    assert!(p2.list_all().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutual_exclusion() {
    let testing = Arc::new(Testing::default());
    let participants = 5;
    let cycles = 4;

    let holders = Arc::new(AtomicUsize::new(0));
    let acquired = Arc::new(AtomicUsize::new(0));
    let mut tasks = vec![];

    for _ in 0..participants {
        let dir = testing.opendal_dir().unwrap();
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
    let observer = testing.opendal_dir().unwrap();
    assert!(!observer.make_lock(LOCK).is_locked().await.unwrap());
}

#[tokio::test]
async fn break_and_obtain_again() {
    let testing = Testing::default();
    let holder_dir = testing.opendal_dir().unwrap();
    let other_dir = testing.opendal_dir().unwrap();
    let holder = holder_dir.make_lock(LOCK);
    let other = other_dir.make_lock(LOCK);

    assert!(!other.is_locked().await.unwrap());
    assert!(holder.obtain().await.unwrap());
    assert!(other.is_locked().await.unwrap());
    assert!(!other.obtain().await.unwrap());
    holder.renew().await.unwrap();

    other_dir.clear_lock(LOCK).await.unwrap();
    assert!(!testing.opendal.exists(LOCK).await.unwrap());

    assert!(other.obtain().await.unwrap());
    // The broken holder's release finds its lease gone and only clears local state.
    holder.release().await.unwrap();
    assert!(holder_dir.make_lock(LOCK).is_locked().await.unwrap());

    other.release().await.unwrap();
    assert!(!holder.is_locked().await.unwrap());
}
