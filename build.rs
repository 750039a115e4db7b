// The peer service has a single unary method whose messages are hand-written
// prost types in src/network/messages/chord.rs, so the service stubs are
// generated without protoc.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dispatch = tonic_build::manual::Method::builder()
        .name("dispatch")
        .route_name("Dispatch")
        .input_type("crate::network::messages::chord::PeerRequest")
        .output_type("crate::network::messages::chord::PeerResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("ChordNode")
        .package("chord")
        .method(dispatch)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
