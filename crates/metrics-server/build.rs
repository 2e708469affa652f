fn main() {
    tonic_build::compile_protos("proto/metrics.proto").expect("failed to compile metrics.proto");
}
