//!
//! NFT Dutch Auction
//!
//! Sells a single ERC721 token at a price that decays by a fixed decrement
//! every block until it reaches the reserve. Bids carry the payment as the
//! attached call value; the first sufficient bid wins, pays the seller and
//! receives the token in the same transaction.

// Allow `cargo stylus export-abi` to generate a main function.
#![cfg_attr(not(any(test, feature = "export-abi")), no_main)]
#![cfg_attr(not(any(test, feature = "export-abi")), no_std)]

#[macro_use]
extern crate alloc;

use alloc::vec::Vec;

use auction_utils_stylus::price;

/// Import items from the SDK. The prelude contains common traits and macros.
use stylus_sdk::{
    alloy_primitives::{Address, U256},
    call::{call, Call},
    prelude::*,
};
use alloy_sol_types::sol;

sol_interface! {
    interface IErc721 {
        function ownerOf(uint256 tokenId) external view returns (address);
        function transferFrom(address from, address to, uint256 tokenId) external;
    }
}

sol! {
    error ZeroAddress();
    error InvalidDuration();
    error PriceOverflow();
    error AlreadyInitialized();
    error UnauthorizedCreation();
    error AuctionExpired();
    error AuctionAlreadyConcluded();
    error InsufficientBid();
    error PaymentSettlementFailed();
    error AssetTransferFailed();
}

#[derive(SolidityError)]
pub enum AuctionError {
    ZeroAddress(ZeroAddress),
    InvalidDuration(InvalidDuration),
    PriceOverflow(PriceOverflow),
    AlreadyInitialized(AlreadyInitialized),
    UnauthorizedCreation(UnauthorizedCreation),
    AuctionExpired(AuctionExpired),
    AuctionAlreadyConcluded(AuctionAlreadyConcluded),
    InsufficientBid(InsufficientBid),
    PaymentSettlementFailed(PaymentSettlementFailed),
    AssetTransferFailed(AssetTransferFailed),
}

sol_storage! {
    #[entrypoint]
    pub struct NftDutchAuction {
        address seller;
        address nft;
        uint256 token_id;
        uint256 reserve_price;
        uint256 num_blocks_auction_open;
        uint256 offer_price_decrement;
        uint256 initial_price;
        uint256 start_block;
        bool concluded;
        address winner;
    }
}

#[public]
impl NftDutchAuction {
    /// One-time setup. The caller becomes the seller and must currently own
    /// the token in the ERC721 registry; the registry must already hold an
    /// approval for this contract so the winning bid can move the token.
    pub fn new(
        &mut self,
        nft: Address,
        token_id: U256,
        reserve_price: U256,
        num_blocks_auction_open: U256,
        offer_price_decrement: U256,
    ) -> Result<(), AuctionError> {
        if self.seller.get() != Address::ZERO {
            return Err(AuctionError::AlreadyInitialized(AlreadyInitialized {}));
        }
        if nft == Address::ZERO {
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
        self.reserve_price.set(reserve_price);
        self.num_blocks_auction_open.set(num_blocks_auction_open);
        self.offer_price_decrement.set(offer_price_decrement);
        self.initial_price.set(initial_price);
        self.start_block.set(start_block);

        log(self.vm(), AuctionCreated {
            seller,
            nft,
            token_id,
            reserve_price,
            num_blocks_auction_open,
            offer_price_decrement,
            start_block,
        });

        Ok(())
    }

    /// Place a bid at the current price. The attached value is the offer;
    /// the full value is forwarded to the seller, so anything above the
    /// required price is an overpayment the seller keeps.
    #[payable]
    pub fn bid(&mut self) -> Result<Address, AuctionError> {
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
        let offered = self.vm().msg_value();
        if offered < required {
            return Err(AuctionError::InsufficientBid(InsufficientBid {}));
        }

        let bidder = self.vm().msg_sender();
        let seller = self.seller.get();

        self.forward_payment(seller, offered)?;
        self.hand_off_asset(seller, bidder)?;

        // Commit only after both transfers succeeded; the concluded check
        // above keeps a reentrant bid from recording a second winner.
        self.winner.set(bidder);
        self.concluded.set(true);

        log(self.vm(), AuctionConcluded {
            winner: bidder,
            amount: offered,
            block_number: U256::from(self.vm().block_number()),
        });

        Ok(bidder)
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

impl NftDutchAuction {
    fn elapsed_blocks(&self) -> U256 {
        U256::from(self.vm().block_number()).saturating_sub(self.start_block.get())
    }

    /// Move the attached value to the seller as a plain transfer.
    fn forward_payment(&mut self, seller: Address, amount: U256) -> Result<(), AuctionError> {
        call(Call::new_in(self).value(amount), seller, &[])
            .map_err(|_| AuctionError::PaymentSettlementFailed(PaymentSettlementFailed {}))?;
        Ok(())
    }

    /// Transfer the token from the seller to the winner using the approval
    /// granted before the auction was created.
    fn hand_off_asset(&mut self, from: Address, to: Address) -> Result<(), AuctionError> {
        let registry = IErc721::new(self.nft.get());
        let token_id = self.token_id.get();
        registry
            .transfer_from(Call::new_in(self), from, to, token_id)
            .map_err(|_| AuctionError::AssetTransferFailed(AssetTransferFailed {}))
    }
}

sol! {
    event AuctionCreated(
        address indexed seller,
        address indexed nft,
        uint256 indexed token_id,
        uint256 reserve_price,
        uint256 num_blocks_auction_open,
        uint256 offer_price_decrement,
        uint256 start_block
    );
    event AuctionConcluded(address indexed winner, uint256 amount, uint256 block_number);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::{SolCall, SolValue};
    use stylus_sdk::testing::*;

    const SELLER: Address = address!("00000000000000000000000000000000000a11ce");
    const BIDDER: Address = address!("0000000000000000000000000000000000000b0b");
    const OTHER: Address = address!("000000000000000000000000000000000000caf3");
    const NFT: Address = address!("00000000000000000000000000000000deadbeef");

    const RESERVE_PRICE: u64 = 100;
    const NUM_BLOCKS_AUCTION_OPEN: u64 = 10;
    const OFFER_PRICE_DECREMENT: u64 = 2;
    const START_BLOCK: u64 = 1;

    mod abi {
        use alloy_sol_types::sol;

        sol! {
            function ownerOf(uint256 tokenId) external view returns (address);
            function transferFrom(address from, address to, uint256 tokenId) external;
        }
    }

    fn token_id() -> U256 {
        U256::ZERO
    }

    fn mock_owner_of(vm: &TestVM, owner: Address) {
        vm.mock_call(
            NFT,
            abi::ownerOfCall { tokenId: token_id() }.abi_encode(),
            Ok(owner.abi_encode()),
        );
    }

    fn mock_payment(vm: &TestVM, ok: bool) {
        let outcome = if ok {
            Ok(vec![])
        } else {
            Err(b"transfer rejected".to_vec())
        };
        vm.mock_call(SELLER, vec![], outcome);
    }

    fn mock_handoff(vm: &TestVM, to: Address, ok: bool) {
        let outcome = if ok {
            Ok(vec![])
        } else {
            Err(b"caller is not token owner or approved".to_vec())
        };
        vm.mock_call(
            NFT,
            abi::transferFromCall {
                from: SELLER,
                to,
                tokenId: token_id(),
            }
            .abi_encode(),
            outcome,
        );
    }

    fn create(vm: &TestVM, auction: &mut NftDutchAuction) {
        vm.set_sender(SELLER);
        vm.set_block_number(START_BLOCK);
        mock_owner_of(vm, SELLER);
        auction
            .new(
                NFT,
                token_id(),
                U256::from(RESERVE_PRICE),
                U256::from(NUM_BLOCKS_AUCTION_OPEN),
                U256::from(OFFER_PRICE_DECREMENT),
            )
            .expect("creation should succeed");
    }

    #[test]
    fn creation_records_seller_and_derives_initial_price() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        assert_eq!(auction.owner(), SELLER);
        assert_eq!(auction.winner(), Address::ZERO);
        assert!(!auction.concluded());
        assert_eq!(auction.initial_price(), U256::from(120));
        assert_eq!(auction.start_block(), U256::from(START_BLOCK));
    }

    #[test]
    fn creation_rejects_a_seller_who_does_not_own_the_token() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        vm.set_sender(SELLER);
        vm.set_block_number(START_BLOCK);
        mock_owner_of(&vm, OTHER);

        let err = auction
            .new(
                NFT,
                token_id(),
                U256::from(RESERVE_PRICE),
                U256::from(NUM_BLOCKS_AUCTION_OPEN),
                U256::from(OFFER_PRICE_DECREMENT),
            )
            .unwrap_err();
        assert!(matches!(err, AuctionError::UnauthorizedCreation(_)));
        assert_eq!(auction.owner(), Address::ZERO);

        // Creating again with the real owner works afterwards.
        create(&vm, &mut auction);
        assert_eq!(auction.owner(), SELLER);
    }

    #[test]
    fn creation_rejects_bad_parameters() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        vm.set_sender(SELLER);

        let err = auction
            .new(
                Address::ZERO,
                token_id(),
                U256::from(RESERVE_PRICE),
                U256::from(NUM_BLOCKS_AUCTION_OPEN),
                U256::from(OFFER_PRICE_DECREMENT),
            )
            .unwrap_err();
        assert!(matches!(err, AuctionError::ZeroAddress(_)));

        let err = auction
            .new(
                NFT,
                token_id(),
                U256::from(RESERVE_PRICE),
                U256::ZERO,
                U256::from(OFFER_PRICE_DECREMENT),
            )
            .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidDuration(_)));

        let err = auction
            .new(NFT, token_id(), U256::MAX, U256::from(2), U256::MAX)
            .unwrap_err();
        assert!(matches!(err, AuctionError::PriceOverflow(_)));
    }

    #[test]
    fn creation_only_happens_once() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        mock_owner_of(&vm, SELLER);
        let err = auction
            .new(
                NFT,
                token_id(),
                U256::from(RESERVE_PRICE),
                U256::from(NUM_BLOCKS_AUCTION_OPEN),
                U256::from(OFFER_PRICE_DECREMENT),
            )
            .unwrap_err();
        assert!(matches!(err, AuctionError::AlreadyInitialized(_)));
    }

    #[test]
    fn price_decays_per_block_and_reads_are_idempotent() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        assert_eq!(auction.get_current_price(), U256::from(120));

        vm.set_block_number(START_BLOCK + 4);
        assert_eq!(auction.get_current_price(), U256::from(112));
        assert_eq!(auction.get_current_price(), U256::from(112));
    }

    #[test]
    fn price_settles_at_the_reserve_once_the_window_has_elapsed() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + NUM_BLOCKS_AUCTION_OPEN);
        assert_eq!(auction.get_current_price(), U256::from(RESERVE_PRICE));

        vm.set_block_number(START_BLOCK + NUM_BLOCKS_AUCTION_OPEN + 5);
        assert_eq!(auction.get_current_price(), U256::from(RESERVE_PRICE));
        assert!(auction.has_expired());
    }

    #[test]
    fn rejects_bids_below_the_current_price() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);

        vm.set_value(U256::from(111));
        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::InsufficientBid(_)));

        vm.set_value(U256::from(50));
        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::InsufficientBid(_)));

        assert_eq!(auction.winner(), Address::ZERO);
        assert!(!auction.concluded());
    }

    #[test]
    fn accepts_a_sufficient_bid_and_records_the_winner() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(112));
        mock_payment(&vm, true);
        mock_handoff(&vm, BIDDER, true);

        let won = auction.bid().expect("bid should settle");
        assert_eq!(won, BIDDER);
        assert_eq!(auction.winner(), BIDDER);
        assert!(auction.concluded());
    }

    #[test]
    fn settles_the_full_attached_value_when_overpaid() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(120));
        mock_payment(&vm, true);
        mock_handoff(&vm, BIDDER, true);

        assert_eq!(auction.bid().unwrap(), BIDDER);
        assert_eq!(auction.winner(), BIDDER);
    }

    #[test]
    fn rejects_every_bid_after_a_winner_is_recorded() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(112));
        mock_payment(&vm, true);
        mock_handoff(&vm, BIDDER, true);
        auction.bid().expect("first bid should settle");

        vm.set_sender(OTHER);
        vm.set_value(U256::from(112));
        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::AuctionAlreadyConcluded(_)));
        assert_eq!(auction.winner(), BIDDER);
    }

    #[test]
    fn rejects_bids_once_the_window_has_elapsed() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        // Exactly at the boundary a reserve-equal bid is expired, not a
        // price failure.
        vm.set_block_number(START_BLOCK + NUM_BLOCKS_AUCTION_OPEN);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(RESERVE_PRICE));
        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::AuctionExpired(_)));

        vm.set_block_number(START_BLOCK + NUM_BLOCKS_AUCTION_OPEN + 5);
        vm.set_value(U256::from(112));
        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::AuctionExpired(_)));

        assert_eq!(auction.winner(), Address::ZERO);
        assert!(!auction.concluded());
    }

    #[test]
    fn a_failed_payment_leaves_the_auction_untouched() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(112));
        mock_payment(&vm, false);

        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::PaymentSettlementFailed(_)));
        assert_eq!(auction.winner(), Address::ZERO);
        assert!(!auction.concluded());
    }

    #[test]
    fn a_failed_asset_transfer_aborts_the_whole_bid() {
        let vm = TestVM::default();
        let mut auction = NftDutchAuction::from(&vm);
        create(&vm, &mut auction);

        vm.set_block_number(START_BLOCK + 4);
        vm.set_sender(BIDDER);
        vm.set_value(U256::from(112));
        mock_payment(&vm, true);
        mock_handoff(&vm, BIDDER, false);

        let err = auction.bid().unwrap_err();
        assert!(matches!(err, AuctionError::AssetTransferFailed(_)));
        assert_eq!(auction.winner(), Address::ZERO);
        assert!(!auction.concluded());
    }
}
