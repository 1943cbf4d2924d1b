use http_lookup::{ConfigOptions, JsonDecoder, LookupArg, ReqwestTransport, RestLookupClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("LOOKUP_URL")?;

    let options = ConfigOptions::new()
        .set("retry-strategy.type", "exponential-delay")
        .set("retry-strategy.exponential-delay.initial-backoff", "100ms")
        .set("retry-strategy.exponential-delay.max-backoff", "2s")
        .set("retry-strategy.exponential-delay.backoff-multiplier", "2")
        .set("max-retries", "4")
        .set("request.timeout", "5s");

    let client: RestLookupClient<ReqwestTransport, JsonDecoder> =
        RestLookupClient::from_options(url, ["id"], &options)?;

    for id in std::env::args().skip(1) {
        match client.pull(&[LookupArg::new("id", id.as_str())]).await {
            Some(row) => println!("{id}: {row}"),
            None => println!("{id}: no row"),
        }
    }

    Ok(())
}
