use tonic_build::Builder;

const DERIVES: &str = "#[derive(serde::Deserialize, serde::Serialize)]";

fn default_builder() -> Builder {
    tonic_build::configure()
        .type_attribute("PoolInfo", DERIVES)
        .type_attribute("PoolStatusResponse", DERIVES)
        .type_attribute("HealthStatus", DERIVES)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    default_builder()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/prime_pool/v1/prime_pool.proto"], &["proto"])?;
    Ok(())
}
