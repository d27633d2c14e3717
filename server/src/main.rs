// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

// Binary part of the application.
// Everything else is in lib.rs so it can be unit tested.

use clap::Parser;
use futures::future;
use log::error;
use server::args::Service;
use server::setup_log;
use smol::Async;
use std::{net::TcpListener, sync::Arc};

fn main() {
    setup_log(false);

    let args = Arc::new(server::args::Config::parse());
    if args.services.is_empty() {
        eprintln!("At least one --service must be specified. See --help");
        return;
    }

    for service in &args.services {
        match service {
            Service::Entrance => {
                let port = args.entrance.entrance_port;
                let sock = Async::<TcpListener>::bind(([0, 0, 0, 0], port))
                    .unwrap_or_else(|_| panic!("Cannot bind to {port}"));
                let mut listener = server::entrance::Listener::new(sock, args.clone());
                smol::spawn(async move {
                    if let Err(err) = listener.listen().await {
                        error!("Entrance: listener died: {err}");
                    }
                })
                .detach();
            }
            Service::Proxy => {
                let port = args.proxy.listen_port;
                let sock = Async::<TcpListener>::bind(([0, 0, 0, 0], port))
                    .unwrap_or_else(|_| panic!("Cannot bind to {port}"));
                let mut listener = server::proxy::Listener::new(sock, &args);
                smol::spawn(async move {
                    if let Err(err) = listener.listen().await {
                        error!("Proxy: listener died: {err}");
                    }
                })
                .detach();
            }
        }
    }

    smol::block_on(future::pending::<()>());
    // this never returns
}
