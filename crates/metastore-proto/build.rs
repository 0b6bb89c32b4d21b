use std::io::Result;

fn main() -> Result<()> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        // JSON output in the CLI
        .type_attribute(".metastore", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".metastore", "#[serde(rename_all = \"camelCase\")]")
        .compile(&["proto/metastore.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/metastore.proto");
    Ok(())
}
