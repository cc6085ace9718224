//! Address book commands.

use std::io::Write;

use pethub_core::{Address, AddressDraft, AddressId};
use pethub_storefront::Storefront;

use super::CommandResult;

fn print_address(out: &mut impl Write, address: &Address) -> std::io::Result<()> {
    writeln!(
        out,
        "{}{:<12} {:<10} {}  {}, {} {} {}  tel {}",
        if address.is_default { "* " } else { "  " },
        address.id.as_str(),
        address.label,
        address.recipient(),
        address.detail,
        address.district,
        address.province,
        address.zip_code,
        address.phone
    )
}

pub async fn list(storefront: &Storefront) -> CommandResult {
    let addresses = storefront.addresses().addresses().await?;
    let mut out = std::io::stdout().lock();
    if addresses.is_empty() {
        writeln!(out, "No saved addresses")?;
    }
    for address in &addresses {
        print_address(&mut out, address)?;
    }
    Ok(())
}

pub async fn add(storefront: &Storefront, draft: &AddressDraft) -> CommandResult {
    let saved = storefront.addresses().add(draft).await?;
    print_address(&mut std::io::stdout().lock(), &saved)?;
    Ok(())
}

pub async fn remove(storefront: &Storefront, id: &str) -> CommandResult {
    storefront.addresses().remove(&AddressId::new(id)).await?;
    tracing::info!("Deleted address {id}");
    Ok(())
}
