//! Build script for v2ray-proto
//!
//! Generates gRPC/protobuf bindings for the vendored V2Ray API schema during
//! `cargo build`.

const PROTOS: &[&str] = &[
    "proto/common/serial/typed_message.proto",
    "proto/common/protocol/headers.proto",
    "proto/common/protocol/user.proto",
    "proto/common/net/address.proto",
    "proto/common/net/port.proto",
    "proto/config.proto",
    "proto/app/proxyman/config.proto",
    "proto/app/proxyman/command/command.proto",
    "proto/app/stats/command/command.proto",
    "proto/proxy/vmess/account.proto",
    "proto/proxy/vmess/inbound/config.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Respect an explicit PROTOC, otherwise use the vendored binary
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()
            .map_err(|e| format!("vendored protoc unavailable: {e}"))?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(PROTOS, &["proto"])?;

    println!("cargo:rerun-if-changed=proto");
    println!("cargo:rerun-if-changed=build.rs");

    Ok(())
}
