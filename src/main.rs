use argh::FromArgs;
use infernum_recognize::{
    LabelVocabulary, RecognizeConfig, Recognizer,
    config::{
        DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH, DEFAULT_MAX_UPLOAD_BYTES,
        DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOP_K,
    },
    onnx::{DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME, OnnxClassifier},
    router,
};
use std::{path::PathBuf, time::Duration};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL_PATH: &str = "mobilenet_v1_1.0_224.onnx";
const DEFAULT_LABELS_PATH: &str = "labels.txt";

#[derive(FromArgs)]
/// Image recognition server returning the top-K labels for an uploaded image.
struct RecognizeArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// path to the ONNX model
    #[argh(option, short = 'm', default = "PathBuf::from(DEFAULT_MODEL_PATH)")]
    model: PathBuf,

    /// path to the label file, one label per line
    #[argh(option, short = 'l', default = "PathBuf::from(DEFAULT_LABELS_PATH)")]
    labels: PathBuf,

    /// height of the model input
    #[argh(option, default = "DEFAULT_INPUT_HEIGHT")]
    input_height: u32,

    /// width of the model input
    #[argh(option, default = "DEFAULT_INPUT_WIDTH")]
    input_width: u32,

    /// number of predictions to return
    #[argh(option, short = 'k', default = "DEFAULT_TOP_K")]
    top_k: usize,

    /// name of the model's input tensor
    #[argh(option, default = "DEFAULT_INPUT_NAME.to_string()")]
    input_name: String,

    /// name of the model's output tensor
    #[argh(option, default = "DEFAULT_OUTPUT_NAME.to_string()")]
    output_name: String,

    /// per-request deadline in seconds
    #[argh(option, default = "DEFAULT_REQUEST_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// largest accepted upload in bytes
    #[argh(option, default = "DEFAULT_MAX_UPLOAD_BYTES")]
    max_upload_bytes: usize,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
    }
    log::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: RecognizeArgs = argh::from_env();

    let config = RecognizeConfig {
        input_height: args.input_height,
        input_width: args.input_width,
        top_k: args.top_k,
        request_timeout: Duration::from_secs(args.timeout_secs),
        max_upload_bytes: args.max_upload_bytes,
    };
    config.validate()?;

    // startup failures are fatal: no serving without both model and labels
    let vocabulary = LabelVocabulary::from_file(&args.labels)?;
    let model = OnnxClassifier::from_file(&args.model, args.input_name, args.output_name)?;
    let recognizer = Recognizer::with_model(model, vocabulary, config)?;

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);
    let app = router(recognizer);

    log::info!("Starting the server");
    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
