//! Input asset ingestion.
//!
//! Two independent stages run before a workflow is queued: inline base64
//! images are pushed to ComfyUI through its `/upload/image` endpoint, and
//! remote URLs are downloaded straight into the ComfyUI input folder. Both
//! stages attempt every item even when earlier ones fail and report one
//! outcome string per item, in input order.

use crate::types::{InlineImage, RemoteFile, StageOutcome, Status};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Timeout for a single remote-file download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Upload inline images to the engine's input folder via multipart POST,
/// overwriting any existing file with the same name.
pub async fn upload_images(
    client: &reqwest::Client,
    base_url: &str,
    images: &[InlineImage],
) -> StageOutcome {
    if images.is_empty() {
        return StageOutcome {
            status: Status::Success,
            message: "No images to upload".to_string(),
            details: Vec::new(),
        };
    }

    info!("uploading {} image(s)", images.len());

    let url = format!("{}/upload/image", base_url);
    let mut details = Vec::with_capacity(images.len());
    let mut failed = false;

    for image in images {
        match upload_one(client, &url, image).await {
            Ok(()) => details.push(format!("Successfully uploaded {}", image.name)),
            Err(e) => {
                warn!("image upload failed: {}", e);
                details.push(e);
                failed = true;
            }
        }
    }

    StageOutcome {
        status: if failed { Status::Error } else { Status::Success },
        message: if failed {
            "Some images failed to upload".to_string()
        } else {
            "All images uploaded successfully".to_string()
        },
        details,
    }
}

async fn upload_one(
    client: &reqwest::Client,
    url: &str,
    image: &InlineImage,
) -> Result<(), String> {
    let blob = BASE64
        .decode(image.image.as_bytes())
        .map_err(|e| format!("Error uploading {}: invalid base64 ({})", image.name, e))?;

    let part = reqwest::multipart::Part::bytes(blob)
        .file_name(image.name.clone())
        .mime_str("image/png")
        .map_err(|e| format!("Error uploading {}: {}", image.name, e))?;
    let form = reqwest::multipart::Form::new()
        .part("image", part)
        .text("overwrite", "true");

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("Error uploading {}: {}", image.name, e))?;

    if response.status() != reqwest::StatusCode::OK {
        let text = response.text().await.unwrap_or_default();
        return Err(format!("Error uploading {}: {}", image.name, text));
    }
    Ok(())
}

/// Download remote files into `input_dir` (created if absent), streaming each
/// response body to disk.
pub async fn download_files(
    client: &reqwest::Client,
    input_dir: &Path,
    files: &[RemoteFile],
) -> StageOutcome {
    if files.is_empty() {
        return StageOutcome {
            status: Status::Success,
            message: "No files to download".to_string(),
            details: Vec::new(),
        };
    }

    info!("downloading {} file(s) from URL(s)", files.len());

    let mut details = Vec::with_capacity(files.len());
    let mut failed = false;

    if let Err(e) = tokio::fs::create_dir_all(input_dir).await {
        // Every item would fail the same way; report once per item for shape
        warn!("could not create input directory {:?}: {}", input_dir, e);
        for file in files {
            details.push(format!("Error saving {}: {}", file.name, e));
        }
        return StageOutcome {
            status: Status::Error,
            message: "Some files failed to download".to_string(),
            details,
        };
    }

    for file in files {
        match download_one(client, input_dir, file).await {
            Ok(path) => {
                info!("saved {} to {}", file.name, path);
                details.push(format!("Successfully downloaded {} to {}", file.name, path));
            }
            Err(e) => {
                warn!("file download failed: {}", e);
                details.push(e);
                failed = true;
            }
        }
    }

    StageOutcome {
        status: if failed { Status::Error } else { Status::Success },
        message: if failed {
            "Some files failed to download".to_string()
        } else {
            "All files downloaded successfully".to_string()
        },
        details,
    }
}

async fn download_one(
    client: &reqwest::Client,
    input_dir: &Path,
    file: &RemoteFile,
) -> Result<String, String> {
    let response = client
        .get(&file.url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| format!("Error downloading {} from {}: {}", file.name, file.url, e))?;

    let path = input_dir.join(&file.name);
    let mut out = tokio::fs::File::create(&path)
        .await
        .map_err(|e| format!("Error saving {}: {}", file.name, e))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| format!("Error downloading {} from {}: {}", file.name, file.url, e))?;
        out.write_all(&chunk)
            .await
            .map_err(|e| format!("Error saving {}: {}", file.name, e))?;
    }
    out.flush()
        .await
        .map_err(|e| format!("Error saving {}: {}", file.name, e))?;

    Ok(path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image(name: &str, data: &[u8]) -> InlineImage {
        InlineImage {
            name: name.to_string(),
            image: BASE64.encode(data),
        }
    }

    #[tokio::test]
    async fn test_empty_image_list_is_success_without_io() {
        // No server exists; an empty list must not touch the network.
        let client = reqwest::Client::new();
        let outcome = upload_images(&client, "http://127.0.0.1:1", &[]).await;
        assert_eq!(outcome.status, Status::Success);
        assert!(outcome.details.is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_list_is_success_without_io() {
        let client = reqwest::Client::new();
        let dir = Path::new("/nonexistent/should/not/be/created");
        let outcome = download_files(&client, dir, &[]).await;
        assert_eq!(outcome.status, Status::Success);
        assert!(outcome.details.is_empty());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_upload_all_succeed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/image")
            .with_status(200)
            .with_body(r#"{"name": "ok"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let images = vec![image("a.png", b"aaa"), image("b.png", b"bbb")];
        let outcome = upload_images(&client, &server.url(), &images).await;

        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.message, "All images uploaded successfully");
        assert_eq!(
            outcome.details,
            vec!["Successfully uploaded a.png", "Successfully uploaded b.png"]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_continues_past_bad_item() {
        let mut server = mockito::Server::new_async().await;
        // Only the two decodable images reach the server.
        let mock = server
            .mock("POST", "/upload/image")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let images = vec![
            image("a.png", b"aaa"),
            InlineImage {
                name: "broken.png".to_string(),
                image: "!!not-base64!!".to_string(),
            },
            image("c.png", b"ccc"),
        ];
        let outcome = upload_images(&client, &server.url(), &images).await;

        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.message, "Some images failed to upload");
        assert_eq!(outcome.details.len(), 3);
        assert!(outcome.details[0].starts_with("Successfully uploaded a.png"));
        assert!(outcome.details[1].starts_with("Error uploading broken.png"));
        assert!(outcome.details[2].starts_with("Successfully uploaded c.png"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_server_rejection_is_per_item_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload/image")
            .with_status(500)
            .with_body("disk full")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let outcome = upload_images(&client, &server.url(), &[image("a.png", b"aaa")]).await;

        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.details, vec!["Error uploading a.png: disk full"]);
    }

    #[tokio::test]
    async fn test_download_writes_file_contents() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/asset.bin")
            .with_status(200)
            .with_body(b"\x00\x01binary\xff".to_vec())
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let client = reqwest::Client::new();
        let files = vec![RemoteFile {
            name: "asset.bin".to_string(),
            url: format!("{}/asset.bin", server.url()),
        }];
        let outcome = download_files(&client, dir.path(), &files).await;

        assert_eq!(outcome.status, Status::Success);
        let written = std::fs::read(dir.path().join("asset.bin")).unwrap();
        assert_eq!(written, b"\x00\x01binary\xff");
    }

    #[tokio::test]
    async fn test_download_continues_past_404() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/one").with_status(200).with_body("1").create_async().await;
        server.mock("GET", "/two").with_status(404).create_async().await;
        server.mock("GET", "/three").with_status(200).with_body("3").create_async().await;

        let dir = TempDir::new().unwrap();
        let client = reqwest::Client::new();
        let files = ["one", "two", "three"]
            .iter()
            .map(|n| RemoteFile {
                name: format!("{}.txt", n),
                url: format!("{}/{}", server.url(), n),
            })
            .collect::<Vec<_>>();
        let outcome = download_files(&client, dir.path(), &files).await;

        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.message, "Some files failed to download");
        assert_eq!(outcome.details.len(), 3);
        assert!(outcome.details[0].starts_with("Successfully downloaded one.txt"));
        assert!(outcome.details[1].starts_with("Error downloading two.txt"));
        assert!(outcome.details[2].starts_with("Successfully downloaded three.txt"));
        // The items around the failure still landed on disk.
        assert!(dir.path().join("one.txt").exists());
        assert!(!dir.path().join("two.txt").exists());
        assert!(dir.path().join("three.txt").exists());
    }

    #[tokio::test]
    async fn test_download_creates_missing_input_dir() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/a").with_status(200).with_body("x").create_async().await;

        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("comfy").join("input");
        let client = reqwest::Client::new();
        let files = vec![RemoteFile {
            name: "a.txt".to_string(),
            url: format!("{}/a", server.url()),
        }];
        let outcome = download_files(&client, &nested, &files).await;

        assert_eq!(outcome.status, Status::Success);
        assert!(nested.join("a.txt").exists());
    }
}
