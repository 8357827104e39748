//!
//! NFT Dutch Auction, ERC20 Bids
//!
//! Same descending-price mechanism as the native-currency auction, settled
//! in an ERC20 token instead: the winning bid pulls exactly the stated
//! amount from the bidder to the seller via `transferFrom`. The pull can be
//! pre-authorized by a prior approval or by an EIP-2612 permit presented
//! with the bid. The contract is meant to live behind a proxy, so a guarded
//! one-time `initialize` replaces the constructor and a storage schema
//! version supports logic replacement.

// Allow `cargo stylus export-abi` to generate a main function.
#![cfg_attr(not(any(test, feature = "export-abi")), no_main)]
#![cfg_attr(not(any(test, feature = "export-abi")), no_std)]

#[macro_use]
extern crate alloc;

use alloc::vec::Vec;

use auction_utils_stylus::price;

/// Import items from the SDK. The prelude contains common traits and macros.
use stylus_sdk::{
    alloy_primitives::{Address, B256, U256},
    call::Call,
    prelude::*,
};
use alloy_sol_types::sol;

/// Storage schema version stamped by `initialize` and `migrate`. A logic
/// replacement that changes the storage shape bumps this and adds its
/// migration step to `migrate`.
const STORAGE_VERSION: u64 = 1;

sol_interface! {
    interface IErc721 {
        function ownerOf(uint256 tokenId) external view returns (address);
        function transferFrom(address from, address to, uint256 tokenId) external;
    }

    interface IErc20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transferFrom(address from, address to, uint256 value) external returns (bool);
        function permit(address owner, address spender, uint256 value, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external;
    }
}

sol! {
    #[derive(Debug)]
    error ZeroAddress();
    #[derive(Debug)]
    error InvalidDuration();
    #[derive(Debug)]
    error PriceOverflow();
    #[derive(Debug)]
    error AlreadyInitialized();
    #[derive(Debug)]
    error NotInitialized();
    #[derive(Debug)]
    error AlreadyMigrated();
    #[derive(Debug)]
    error UnauthorizedCreation();
    #[derive(Debug)]
    error AuctionExpired();
    #[derive(Debug)]
    error AuctionAlreadyConcluded();
    #[derive(Debug)]
    error InsufficientBid();
    #[derive(Debug)]
    error PermitInvalid();
    #[derive(Debug)]
    error PaymentSettlementFailed();
    #[derive(Debug)]
    error AssetTransferFailed();
}

#[derive(SolidityError, Debug)]
pub enum AuctionError {
    ZeroAddress(ZeroAddress),
    InvalidDuration(InvalidDuration),
    PriceOverflow(PriceOverflow),
    AlreadyInitialized(AlreadyInitialized),
    NotInitialized(NotInitialized),
    AlreadyMigrated(AlreadyMigrated),
    UnauthorizedCreation(UnauthorizedCreation),
    AuctionExpired(AuctionExpired),
    AuctionAlreadyConcluded(AuctionAlreadyConcluded),
    InsufficientBid(InsufficientBid),
    PermitInvalid(PermitInvalid),
    PaymentSettlementFailed(PaymentSettlementFailed),
    AssetTransferFailed(AssetTransferFailed),
}

sol_storage! {
    #[entrypoint]
    pub struct NftDutchAuctionErc20Bids {
        // Layout is append-only across logic versions: new fields go after
        // `version`, existing slots never move or change type.
        address seller;
        address nft;
        uint256 token_id;
        address payment_token;
        uint256 reserve_price;
        uint256 num_blocks_auction_open;
        uint256 offer_price_decrement;
        uint256 initial_price;
        uint256 start_block;
        bool concluded;
        address winner;
        uint256 version;
    }
}

#[public]
impl NftDutchAuctionErc20Bids {
    /// One-time initializer, standing in for the constructor behind a
    /// proxy. The caller becomes the seller and must currently own the
    /// token in the ERC721 registry. A second call always fails.
    pub fn initialize(
        &mut self,
        erc20_token: Address,
        nft: Address,
        token_id: U256,
        reserve_price: U256,
        num_blocks_auction_open: U256,
        offer_price_decrement: U256,
    ) -> Result<(), AuctionError> {
        if !self.version.get().is_zero() {
            return Err(AuctionError::AlreadyInitialized(AlreadyInitialized {}));
        }
        if erc20_token == Address::ZERO || nft == Address::ZERO {
            return Err(AuctionError::ZeroAddress(ZeroAddress {}));
        }
        if num_blocks_auction_open.is_zero() {
            return Err(AuctionError::InvalidDuration(InvalidDuration {}));
        }
        let initial_price = match price::initial_price(
            reserve_price,
            num_blocks_auction_open,
            offer_price_decrement,
        ) {
            Some(p) => p,
            None => return Err(AuctionError::PriceOverflow(PriceOverflow {})),
        };

        let seller = self.vm().msg_sender();
        let registry = IErc721::new(nft);
        let current_owner = registry
            .owner_of(Call::new_in(self), token_id)
            .map_err(|_| AuctionError::UnauthorizedCreation(UnauthorizedCreation {}))?;
        if current_owner != seller {
            return Err(AuctionError::UnauthorizedCreation(UnauthorizedCreation {}));
        }

        let start_block = U256::from(self.vm().block_number());
        self.seller.set(seller);
        self.nft.set(nft);
        self.token_id.set(token_id);
        self.payment_token.set(erc20_token);
        self.reserve_price.set(reserve_price);
        self.num_blocks_auction_open.set(num_blocks_auction_open);
        self.offer_price_decrement.set(offer_price_decrement);
        self.initial_price.set(initial_price);
        self.start_block.set(start_block);
        self.version.set(U256::from(STORAGE_VERSION));

        log(self.vm(), AuctionCreated {
            seller,
            nft,
            token_id,
            payment_token: erc20_token,
            reserve_price,
            num_blocks_auction_open,
            offer_price_decrement,
            start_block,
        });

        Ok(())
    }

    /// Place a bid of exactly `amount` tokens. The bidder must have granted
    /// this contract an allowance of at least `amount` beforehand; exactly
    /// the stated amount is pulled, never a clamped-down minimum.
    pub fn bid(&mut self, amount: U256) -> Result<Address, AuctionError> {
        self.admit(amount)?;

        let bidder = self.vm().msg_sender();
        let seller = self.seller.get();

        self.collect_payment(bidder, seller, amount)?;
        self.hand_off_asset(seller, bidder)?;
        self.conclude(bidder, amount);

        Ok(bidder)
    }

    /// Place a bid of exactly `amount` tokens, presenting an EIP-2612
    /// permit instead of a prior approval. The permit message (signed over
    /// this contract as spender, with the token's nonce and `deadline`) is
    /// relayed to the token, which verifies signature, nonce and expiry.
    pub fn bid_with_permit(
        &mut self,
        amount: U256,
        permit_value: U256,
        deadline: U256,
        v: u8,
        r: B256,
        s: B256,
    ) -> Result<Address, AuctionError> {
        self.admit(amount)?;

        let bidder = self.vm().msg_sender();
        let seller = self.seller.get();

        self.apply_permit(bidder, permit_value, deadline, v, r, s)?;
        self.collect_payment(bidder, seller, amount)?;
        self.hand_off_asset(seller, bidder)?;
        self.conclude(bidder, amount);

        Ok(bidder)
    }

    /// Storage schema version currently stamped into this instance.
    pub fn current_version(&self) -> U256 {
        self.version.get()
    }

    /// Applies storage migrations after a logic replacement. Refuses to run
    /// before initialization and refuses to run twice for the same version.
    pub fn migrate(&mut self) -> Result<(), AuctionError> {
        let from_version = self.version.get();
        if from_version.is_zero() {
            return Err(AuctionError::NotInitialized(NotInitialized {}));
        }
        if from_version >= U256::from(STORAGE_VERSION) {
            return Err(AuctionError::AlreadyMigrated(AlreadyMigrated {}));
        }

        // Future logic versions insert their migration steps here, keyed on
        // `from_version`, before the new version is stamped.
        self.version.set(U256::from(STORAGE_VERSION));

        log(self.vm(), StorageMigrated {
            from_version,
            to_version: U256::from(STORAGE_VERSION),
        });

        Ok(())
    }

    /// Price a bid must meet right now.
    pub fn get_current_price(&self) -> U256 {
        price::current_price(
            self.reserve_price.get(),
            self.num_blocks_auction_open.get(),
            self.offer_price_decrement.get(),
            self.elapsed_blocks(),
        )
    }

    /// True once the open window has fully elapsed with no winner.
    pub fn has_expired(&self) -> bool {
        !self.concluded.get() && self.elapsed_blocks() >= self.num_blocks_auction_open.get()
    }

    /// Seller of the auctioned token.
    pub fn owner(&self) -> Address {
        self.seller.get()
    }

    /// Winning bidder, or the zero address while the auction is open.
    pub fn winner(&self) -> Address {
        self.winner.get()
    }

    pub fn concluded(&self) -> bool {
        self.concluded.get()
    }

    /// Opening price: `reserve + duration * decrement`.
    pub fn initial_price(&self) -> U256 {
        self.initial_price.get()
    }

    pub fn nft(&self) -> Address {
        self.nft.get()
    }

    pub fn token_id(&self) -> U256 {
        self.token_id.get()
    }

    /// ERC20 ledger the bids settle in.
    pub fn payment_token(&self) -> Address {
        self.payment_token.get()
    }

    pub fn reserve_price(&self) -> U256 {
        self.reserve_price.get()
    }

    pub fn num_blocks_auction_open(&self) -> U256 {
        self.num_blocks_auction_open.get()
    }

    pub fn offer_price_decrement(&self) -> U256 {
        self.offer_price_decrement.get()
    }

    pub fn start_block(&self) -> U256 {
        self.start_block.get()
    }
}

impl NftDutchAuctionErc20Bids {
    fn elapsed_blocks(&self) -> U256 {
        U256::from(self.vm().block_number()).saturating_sub(self.start_block.get())
    }

    /// Admission checks, in a fixed order: a concluded auction rejects
    /// everything, then expiry, then the price. Expiry is decided before
    /// and independently of the amount, so a reserve-equal bid at the exact
    /// closing boundary is expired, not admitted.
    fn admit(&self, amount: U256) -> Result<(), AuctionError> {
        if self.concluded.get() {
            return Err(AuctionError::AuctionAlreadyConcluded(AuctionAlreadyConcluded {}));
        }

        let elapsed = self.elapsed_blocks();
        if elapsed >= self.num_blocks_auction_open.get() {
            return Err(AuctionError::AuctionExpired(AuctionExpired {}));
        }

        let required = price::current_price(
            self.reserve_price.get(),
            self.num_blocks_auction_open.get(),
            self.offer_price_decrement.get(),
            elapsed,
        );
        if amount < required {
            return Err(AuctionError::InsufficientBid(InsufficientBid {}));
        }

        Ok(())
    }

    /// Relay a signed allowance grant to the token. The token enforces the
    /// signature, the per-owner nonce and the deadline.
    fn apply_permit(
        &mut self,
        owner: Address,
        value: U256,
        deadline: U256,
        v: u8,
        r: B256,
        s: B256,
    ) -> Result<(), AuctionError> {
        let token = IErc20::new(self.payment_token.get());
        let spender = self.vm().contract_address();
        token
            .permit(Call::new_in(self), owner, spender, value, deadline, v, r, s)
            .map_err(|_| AuctionError::PermitInvalid(PermitInvalid {}))
    }

    /// Pull exactly `amount` from the bidder to the seller. A shortfall in
    /// balance or allowance is a settlement failure: the bid amount itself
    /// was acceptable, only the funds movement failed.
    fn collect_payment(
        &mut self,
        bidder: Address,
        seller: Address,
        amount: U256,
    ) -> Result<(), AuctionError> {
        let token = IErc20::new(self.payment_token.get());
        let spender = self.vm().contract_address();

        let balance = token
            .balance_of(Call::new_in(self), bidder)
            .map_err(|_| AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}))?;
        let allowance = token
            .allowance(Call::new_in(self), bidder, spender)
            .map_err(|_| AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}))?;
        if balance < amount || allowance < amount {
            return Err(AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}));
        }

        let transferred = token
            .transfer_from(Call::new_in(self), bidder, seller, amount)
            .map_err(|_| AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}))?;
        if !transferred {
            return Err(AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}));
        }

        Ok(())
    }

    /// Transfer the token from the seller to the winner using the approval
    /// granted before initialization.
    fn hand_off_asset(&mut self, from: Address, to: Address) -> Result<(), AuctionError> {
        let registry = IErc721::new(self.nft.get());
        let token_id = self.token_id.get();
        registry
            .transfer_from(Call::new_in(self), from, to, token_id)
            .map_err(|_| AuctionError::AssetTransferFailed(AssetTransferFailed {}))
    }

    /// Record the winner. Runs once, only after both transfers succeeded.
    fn conclude(&mut self, bidder: Address, amount: U256) {
        self.winner.set(bidder);
        self.concluded.set(true);

        log(self.vm(), AuctionConcluded {
            winner: bidder,
            amount,
            block_number: U256::from(self.vm().block_number()),
        });
    }
}

sol! {
    event AuctionCreated(
        address indexed seller,
        address indexed nft,
        uint256 indexed token_id,
        address payment_token,
        uint256 reserve_price,
        uint256 num_blocks_auction_open,
        uint256 offer_price_decrement,
        uint256 start_block
    );
    event AuctionConcluded(address indexed winner, uint256 amount, uint256 block_number);
    event StorageMigrated(uint256 from_version, uint256 to_version);
}
