use ssh_shell::{PasswordShell, Shell, Verbose};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let argv = std::env::args().collect::<Vec<String>>();
    let host = argv.get(1).expect("host is required");
    let port: u16 = argv.get(2).expect("port is required").parse()?;
    let login = argv.get(3).expect("login is required");
    let password = argv.get(4).expect("password is required");
    let command = argv.get(5).expect("command is required");

    let shell = Verbose::new(PasswordShell::new(host, port, login, password));

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let exit = shell
        .exec(command, &mut tokio::io::empty(), &mut stdout, &mut stderr)
        .await?;

    println!("exit code: {exit}");
    Ok(())
}
