#[macro_use]
extern crate log;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pingpong_suite::{
    configuration::{Configuration, Parser},
    connection::ConnectionManager,
    correlator::RoundtripCorrelator,
    dispatcher::PingDispatcher,
    link::{request_control, UdpResolver},
    node::PingPongNode,
    server::PeerServer,
    stats::MetricsAggregator,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let conf = Configuration::parse();
    if let Err(e) = conf.validate() {
        eprintln!("Configuration is broken: {}", e);
        std::process::exit(1);
    }

    if let Some(call) = conf.control {
        match request_control(conf.peer_name.trim(), call, conf.control_timeout()).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                eprintln!("Request to {} failed: {}", conf.peer_name, e);
                std::process::exit(1);
            }
        }
        return;
    }

    info!("Configuration valid. Starting up...");
    if conf.interval_without_peer() {
        warn!("Ping interval is set but no peer is configured; pings are disabled");
    }

    let server = match PeerServer::bind(conf.local_addr).await {
        Ok(s) => s.with_max_in_flight(conf.max_in_flight),
        Err(e) => {
            eprintln!("Cannot bind to address {}: {}", conf.local_addr, e);
            std::process::exit(1);
        }
    };

    let node = Arc::new(PingPongNode::new(
        ConnectionManager::new(conf.peer_name.clone(), Arc::new(UdpResolver)),
        RoundtripCorrelator::new(),
        MetricsAggregator::new(),
    ));

    if let Err(e) = node.connection().ensure_connected().await {
        error!("{}", e);
    }

    let cancel = CancellationToken::new();
    println!(
        "Pingpong peer listening on {}",
        server.local_addr().unwrap_or(conf.local_addr)
    );
    let server_task = tokio::spawn(server.run(node.clone(), cancel.clone()));
    let dispatcher = PingDispatcher::start(node.clone(), conf.dispatch_settings(), cancel.clone());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
    }

    info!("Shutting down...");
    cancel.cancel();
    dispatcher.stop().await;
    if let Err(e) = server_task.await {
        error!("Peer server terminated abnormally: {}", e);
    }

    node.snapshot().print(conf.output_format);
}
