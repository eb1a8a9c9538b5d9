//! Exercises the engine's public API from the command line against a
//! `FileStorage` directory. This is a demo harness, not the router the
//! crate deliberately leaves out of scope.
use std::sync::Arc;

use abe_secrets_core::crypto::DecryptOutcome;
use abe_secrets_core::engine::AbeEngine;
use abe_secrets_core::model::AttributeScope;
use abe_secrets_core::storage::FileStorage;
use clap::{App, Arg, SubCommand};

fn scope_from_args(authority: Option<&str>) -> AttributeScope {
    match authority {
        Some(authority) => AttributeScope::Authority(authority.to_string()),
        None => AttributeScope::Common,
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let matches = App::new("demo-console")
        .about("exercises abe-secrets-core's library API against a local FileStorage directory")
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .takes_value(true)
                .default_value("./demo-data"),
        )
        .subcommand(SubCommand::with_name("init"))
        .subcommand(
            SubCommand::with_name("auth-setup")
                .arg(Arg::with_name("authority").long("authority").takes_value(true))
                .arg(Arg::with_name("attribute").long("attribute").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .arg(Arg::with_name("gid").long("gid").takes_value(true).required(true))
                .arg(Arg::with_name("authority").long("authority").takes_value(true))
                .arg(Arg::with_name("attribute").long("attribute").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("encrypt")
                .arg(Arg::with_name("policy").long("policy").takes_value(true).required(true))
                .arg(Arg::with_name("message").long("message").takes_value(true).required(true))
                .arg(Arg::with_name("out").long("out").takes_value(true).required(true)),
        )
        .subcommand(
            SubCommand::with_name("decrypt")
                .arg(Arg::with_name("gid").long("gid").takes_value(true).required(true))
                .arg(Arg::with_name("subject").long("subject").takes_value(true))
                .arg(Arg::with_name("sub-policy").long("sub-policy").takes_value(true))
                .arg(Arg::with_name("cryptogram").long("cryptogram").takes_value(true).required(true))
                .arg(Arg::with_name("out").long("out").takes_value(true)),
        )
        .get_matches();

    let data_dir = matches.value_of("data-dir").unwrap();
    let storage = Arc::new(FileStorage::new(data_dir).expect("open data dir"));
    let engine = AbeEngine::new(storage);

    let result = match matches.subcommand() {
        ("init", _) => engine.init().map(|_| ()),
        ("auth-setup", Some(sub)) => {
            let scope = scope_from_args(sub.value_of("authority"));
            engine
                .auth_setup(scope, sub.value_of("attribute").unwrap())
                .map(|_| ())
        }
        ("keygen", Some(sub)) => {
            let scope = scope_from_args(sub.value_of("authority"));
            engine
                .keygen(sub.value_of("gid").unwrap(), scope, sub.value_of("attribute").unwrap())
                .map(|_| ())
        }
        ("encrypt", Some(sub)) => engine
            .encrypt(sub.value_of("policy").unwrap(), sub.value_of("message").unwrap().as_bytes())
            .and_then(|cryptogram| {
                let json = serde_json::to_vec_pretty(&cryptogram).map_err(abe_secrets_core::AbeError::from)?;
                std::fs::write(sub.value_of("out").unwrap(), json)
                    .map_err(|e| abe_secrets_core::AbeError::StorageFault(e.to_string()))
            }),
        ("decrypt", Some(sub)) => {
            let bytes = std::fs::read(sub.value_of("cryptogram").unwrap()).expect("read cryptogram file");
            let cryptogram = serde_json::from_slice(&bytes).expect("parse cryptogram");
            let gid = sub.value_of("gid").unwrap();
            let subject = sub.value_of("subject").unwrap_or(gid);
            engine
                .sys_decrypt(gid, subject, sub.value_of("sub-policy"), &cryptogram)
                .and_then(|outcome| match outcome {
                    DecryptOutcome::Plaintext(plaintext) => {
                        println!("{}", String::from_utf8_lossy(&plaintext));
                        Ok(())
                    }
                    DecryptOutcome::Relayed(relayed) => {
                        let out = sub.value_of("out").expect("--out is required when the decryption only relays");
                        let json = serde_json::to_vec_pretty(&relayed).map_err(abe_secrets_core::AbeError::from)?;
                        std::fs::write(out, json).map_err(|e| abe_secrets_core::AbeError::StorageFault(e.to_string()))?;
                        println!("partial decryption relayed; updated cryptogram written to {}", out);
                        Ok(())
                    }
                })
        }
        _ => {
            eprintln!("no subcommand given; try --help");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
