//! Prints an argon2 hash for seeding usuarios.password by hand.

use medcare_server::auth::hash_password;

fn main() -> anyhow::Result<()> {
    let Some(password) = std::env::args().nth(1) else {
        anyhow::bail!("usage: hashpass <password>");
    };
    let phc = hash_password(&password).map_err(anyhow::Error::msg)?;
    println!("{phc}");
    Ok(())
}
