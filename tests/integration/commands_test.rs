use sysmon::cli::build_cli;

#[test]
fn test_monitor_arguments() {
    let matches = build_cli()
        .try_get_matches_from(["sysmon", "monitor", "-i", "500", "-n", "3", "--json"])
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();

    assert_eq!(name, "monitor");
    assert_eq!(sub.get_one::<u64>("interval"), Some(&500));
    assert_eq!(sub.get_one::<u64>("count"), Some(&3));
    assert_eq!(sub.get_one::<usize>("window"), Some(&60));
    assert!(sub.get_flag("json"));
}

#[test]
fn test_zero_interval_is_rejected() {
    assert!(build_cli()
        .try_get_matches_from(["sysmon", "monitor", "--interval", "0"])
        .is_err());
}

#[test]
fn test_speedtest_endpoint_and_url_conflict() {
    assert!(build_cli()
        .try_get_matches_from([
            "sysmon",
            "speedtest",
            "--endpoint",
            "cloudflare",
            "--url",
            "http://example.com/x",
        ])
        .is_err());
}

#[test]
fn test_connectivity_hosts_repeat() {
    let matches = build_cli()
        .try_get_matches_from([
            "sysmon",
            "connectivity",
            "--host",
            "a.example:80",
            "--host",
            "b.example:443",
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let hosts: Vec<&String> = sub.get_many::<String>("host").unwrap().collect();
    assert_eq!(hosts, ["a.example:80", "b.example:443"]);
}

#[test]
fn test_config_requires_subcommand() {
    assert!(build_cli()
        .try_get_matches_from(["sysmon", "config"])
        .is_err());
    assert!(build_cli()
        .try_get_matches_from(["sysmon", "config", "set", "interval_ms", "200"])
        .is_ok());
}

#[test]
fn test_verbose_is_global() {
    let matches = build_cli()
        .try_get_matches_from(["sysmon", "connectivity", "-vv"])
        .unwrap();
    assert_eq!(matches.get_count("verbose"), 2);
}

#[test]
fn test_info_filters() {
    let matches = build_cli()
        .try_get_matches_from(["sysmon", "info", "--network", "--json"])
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();

    assert_eq!(name, "info");
    assert!(sub.get_flag("network"));
    assert!(!sub.get_flag("system"));
    assert!(sub.get_flag("json"));
}
