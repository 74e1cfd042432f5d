use aws_sdk_s3::Client as S3Client;
use aws_config::ConfigLoader;
use aws_types::region::Region;
use aws_config::BehaviorVersion;

/// Builds a client for S3 or an S3-compatible endpoint (R2, MinIO).
/// A custom endpoint switches to path-style addressing.
pub async fn create_s3_client(region: Option<String>, endpoint_url: Option<String>) -> S3Client {
    let aws_config = ConfigLoader::default()
        .region(region.map(Region::new))
        .behavior_version(BehaviorVersion::latest())
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
    if let Some(endpoint_url) = endpoint_url {
        builder = builder.endpoint_url(endpoint_url).force_path_style(true);
    }

    S3Client::from_conf(builder.build())
}
